// Stage identity and the run-length constants derived from a rank.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based position of a stage in the pipeline.
pub type Rank = usize;

// ── Stage Role ───────────────────────────────────────────────────────────────

/// What a stage does with the data passing through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageRole {
    /// Rank 0: splits the input into single-element runs.
    Source,
    /// Ranks `1..P-1`: merges run pairs and forwards the result.
    Merge,
    /// Rank `P-1`: final merge into the sorted output.
    Sink,
    /// The only stage of a one-element pipeline; both Source and Sink.
    Solo,
}

impl StageRole {
    /// Role of `rank` in a pipeline of `stages` stages, `None` if the rank
    /// does not exist.
    pub fn for_rank(rank: Rank, stages: usize) -> Option<Self> {
        match (rank, stages) {
            (_, 0) => None,
            (r, s) if r >= s => None,
            (0, 1) => Some(Self::Solo),
            (0, _) => Some(Self::Source),
            (r, s) if r == s - 1 => Some(Self::Sink),
            _ => Some(Self::Merge),
        }
    }

    /// True if the stage receives from an upstream neighbour.
    pub fn has_upstream(&self) -> bool {
        matches!(self, Self::Merge | Self::Sink)
    }

    /// True if the stage sends to a downstream neighbour.
    pub fn has_downstream(&self) -> bool {
        matches!(self, Self::Source | Self::Merge)
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Source"),
            Self::Merge  => write!(f, "Merge"),
            Self::Sink   => write!(f, "Sink"),
            Self::Solo   => write!(f, "Solo"),
        }
    }
}

// ── Stage Spec ───────────────────────────────────────────────────────────────

/// A rank together with its role. All per-stage constants derive from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub rank: Rank,
    pub role: StageRole,
}

impl StageSpec {
    /// Length of the sorted runs arriving on each input buffer: `2^(r-1)`.
    /// Zero for rank 0, which has no input buffers.
    pub fn input_run_length(&self) -> usize {
        match self.rank {
            0 => 0,
            r => 1 << (r - 1),
        }
    }

    /// Length of the sorted runs this stage emits: `2^r`. The outgoing tag
    /// toggles after this many sends.
    pub fn output_run_length(&self) -> usize {
        1 << self.rank
    }

    /// Number of drive-loop iterations for a pipeline over `elements` values.
    pub fn iterations(&self, elements: usize) -> usize {
        elements + self.input_run_length()
    }

    /// Upper bound on the combined occupancy of both input buffers.
    pub fn occupancy_bound(&self) -> usize {
        self.input_run_length() + 1
    }

    pub fn upstream(&self) -> Option<Rank> {
        self.role.has_upstream().then(|| self.rank - 1)
    }

    pub fn downstream(&self) -> Option<Rank> {
        self.role.has_downstream().then(|| self.rank + 1)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
