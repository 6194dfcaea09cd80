use pms_types::{ConfigError, Rank};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("stage {rank}: expected {expected} input elements, got: {actual}")]
    Input {
        rank: Rank,
        expected: usize,
        actual: usize,
    },

    #[error("stage {rank}: link to stage {peer} closed")]
    Disconnected { rank: Rank, peer: Rank },

    #[error("stage {rank}: merge step with both input buffers empty")]
    Underrun { rank: Rank },

    #[error("stage {rank} failed: {reason}")]
    StageFailed { rank: Rank, reason: String },
}

impl PipelineError {
    /// Rank of the stage the error is reported against. Configuration errors
    /// are detected before any merging starts and count against the Source.
    pub fn rank(&self) -> Rank {
        match self {
            Self::Config(_) => 0,
            Self::Input { rank, .. }
            | Self::Disconnected { rank, .. }
            | Self::Underrun { rank }
            | Self::StageFailed { rank, .. } => *rank,
        }
    }

    /// A closed link only ever follows another stage's failure.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_report_rank_zero() {
        let err = PipelineError::from(ConfigError::NotPowerOfTwo { elements: 6 });
        assert_eq!(err.rank(), 0);
        assert!(!err.is_disconnect());
    }

    #[test]
    fn stage_errors_report_their_own_rank() {
        assert_eq!(PipelineError::Input { rank: 0, expected: 8, actual: 3 }.rank(), 0);
        assert_eq!(PipelineError::Underrun { rank: 2 }.rank(), 2);

        let closed = PipelineError::Disconnected { rank: 3, peer: 2 };
        assert_eq!(closed.rank(), 3);
        assert!(closed.is_disconnect());
    }
}
