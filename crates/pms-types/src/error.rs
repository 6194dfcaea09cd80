// Configuration errors. Every one of them is fatal and is raised before any
// stage is spawned.

use crate::stage::Rank;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("element count must be a non-zero power of two, got: {elements}")]
    NotPowerOfTwo { elements: usize },

    #[error("expected {expected} stages for {elements} elements, got: {actual}")]
    StageCountMismatch {
        elements: usize,
        expected: usize,
        actual: usize,
    },

    #[error("channel capacity must be at least 1")]
    ZeroCapacity,

    #[error("channel capacity must be at most {max}, got: {actual}")]
    CapacityTooLarge { max: usize, actual: usize },

    #[error("expected rank from range <0, {last}>, got: {rank}")]
    RankOutOfRange { rank: Rank, last: Rank },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
