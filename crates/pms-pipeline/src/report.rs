use pms_types::{Rank, StageRole};
use serde::{Deserialize, Serialize};

/// What one stage did over the lifetime of a sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub rank: Rank,
    pub role: StageRole,
    /// Messages received from upstream; for the Source, input elements read.
    pub received: usize,
    /// Elements sent downstream, or appended to the output by the Sink.
    pub emitted: usize,
    /// Largest combined size of both input buffers.
    pub peak_occupancy: usize,
    /// Drive-loop iteration at which merging latched on.
    pub merge_started_at: Option<usize>,
}
