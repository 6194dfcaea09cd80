//! `pms-pipeline`: the pipeline merge-sort network.
//!
//! A chain of `P = log2(N) + 1` stages, each running as its own task and
//! talking only to its immediate neighbours over ordered links. Rank `r`
//! merges pairs of sorted runs of length `2^(r-1)` arriving on its two
//! tagged buffers into runs of length `2^r`, streaming each output element
//! as soon as it can be decided.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐ U/L ┌──────────┐ UU/LL ┌──────────┐      ┌──────────┐
//! │  Source  │────▶│  Merge   │──────▶│  Merge   │─ ─ ─▶│   Sink   │
//! │  rank 0  │     │  rank 1  │       │  rank 2  │      │ rank P-1 │
//! └──────────┘     └──────────┘       └──────────┘      └──────────┘
//!   runs of 1        runs of 2          runs of 4          sorted N
//! ```

pub mod buffer;
pub mod coordinator;
pub mod emit;
pub mod error;
pub mod executor;
pub mod merge;
pub mod report;
pub mod transport;

// ── Public re-exports ────────────────────────────────────────────────────────

pub use buffer::Buffer;
pub use coordinator::{sort, PipelineCoordinator, SortOutcome};
pub use emit::{Collect, Emit, Forward, TagCursor};
pub use error::{PipelineError, Result};
pub use executor::StageExecutor;
pub use merge::MergeCore;
pub use report::StageReport;
pub use transport::{link, ChannelInbound, ChannelOutbound, Inbound, Outbound};
