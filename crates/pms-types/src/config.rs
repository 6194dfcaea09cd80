// Pipeline configuration and its validated form.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::stage::{Rank, StageRole, StageSpec};

/// Element count of the reference setup.
pub const DEFAULT_ELEMENTS: usize = 16;

/// Stage count of the reference setup: `log2(16) + 1`.
pub const DEFAULT_STAGES: usize = 5;

/// Messages a link buffers before the sender blocks.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Largest link capacity a tokio channel accepts (`Semaphore::MAX_PERMITS`).
pub const MAX_CHANNEL_CAPACITY: usize = usize::MAX >> 3;

/// Number of stages a pipeline over `elements` values needs, or `None` when
/// `elements` is not a non-zero power of two.
pub fn expected_stages(elements: usize) -> Option<usize> {
    elements
        .is_power_of_two()
        .then(|| elements.trailing_zeros() as usize + 1)
}

// ── Sort Config ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    /// Number of input elements (`N`). Must be a power of two.
    pub elements: usize,

    /// Number of stages (`P`). Must equal `log2(N) + 1`.
    pub stages: usize,

    /// Buffer slots on each inter-stage link. Must lie in
    /// `1..=MAX_CHANNEL_CAPACITY`.
    pub channel_capacity: usize,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            elements: DEFAULT_ELEMENTS,
            stages: DEFAULT_STAGES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SortConfig {
    /// Config for `elements` values with the stage count derived from it.
    pub fn for_elements(elements: usize) -> Self {
        Self {
            elements,
            stages: expected_stages(elements).unwrap_or(0),
            ..Self::default()
        }
    }

    pub fn with_stages(mut self, stages: usize) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Check that `elements`, `stages` and `channel_capacity` agree.
    pub fn validate(&self) -> Result<Topology> {
        let expected = expected_stages(self.elements).ok_or(ConfigError::NotPowerOfTwo {
            elements: self.elements,
        })?;

        if self.stages != expected {
            return Err(ConfigError::StageCountMismatch {
                elements: self.elements,
                expected,
                actual: self.stages,
            });
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        if self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(ConfigError::CapacityTooLarge {
                max: MAX_CHANNEL_CAPACITY,
                actual: self.channel_capacity,
            });
        }

        Ok(Topology {
            elements: self.elements,
            stages: self.stages,
            channel_capacity: self.channel_capacity,
        })
    }
}

// ── Topology ─────────────────────────────────────────────────────────────────

/// A [`SortConfig`] that passed validation. Only [`SortConfig::validate`]
/// builds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Topology {
    elements: usize,
    stages: usize,
    channel_capacity: usize,
}

impl Topology {
    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn num_stages(&self) -> usize {
        self.stages
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn last_rank(&self) -> Rank {
        self.stages - 1
    }

    pub fn stage(&self, rank: Rank) -> Result<StageSpec> {
        let role = StageRole::for_rank(rank, self.stages).ok_or(ConfigError::RankOutOfRange {
            rank,
            last: self.last_rank(),
        })?;
        Ok(StageSpec { rank, role })
    }

    /// Every stage in rank order.
    pub fn stages(&self) -> impl Iterator<Item = StageSpec> + '_ {
        (0..self.stages).filter_map(move |rank| self.stage(rank).ok())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let cfg = SortConfig::default();
        assert_eq!(cfg.elements, 16);
        assert_eq!(cfg.stages, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn stage_count_is_derived() {
        assert_eq!(expected_stages(1), Some(1));
        assert_eq!(expected_stages(2), Some(2));
        assert_eq!(expected_stages(8), Some(4));
        assert_eq!(expected_stages(1024), Some(11));
        assert_eq!(expected_stages(0), None);
        assert_eq!(expected_stages(12), None);

        assert_eq!(SortConfig::for_elements(8).stages, 4);
    }

    #[test]
    fn not_power_of_two_rejected() {
        let err = SortConfig::for_elements(6).validate().unwrap_err();
        assert_eq!(err, ConfigError::NotPowerOfTwo { elements: 6 });

        let err = SortConfig::for_elements(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::NotPowerOfTwo { elements: 0 });
    }

    #[test]
    fn stage_mismatch_reports_expected_and_actual() {
        let err = SortConfig::for_elements(8).with_stages(5).validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::StageCountMismatch { elements: 8, expected: 4, actual: 5 }
        );
        assert_eq!(err.to_string(), "expected 4 stages for 8 elements, got: 5");
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = SortConfig::for_elements(4)
            .with_channel_capacity(0)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity);
    }

    #[test]
    fn capacity_upper_bound() {
        let at_max = SortConfig::for_elements(4).with_channel_capacity(MAX_CHANNEL_CAPACITY);
        assert!(at_max.validate().is_ok());

        let err = SortConfig::for_elements(4)
            .with_channel_capacity(MAX_CHANNEL_CAPACITY + 1)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::CapacityTooLarge {
                max: MAX_CHANNEL_CAPACITY,
                actual: MAX_CHANNEL_CAPACITY + 1,
            }
        );
    }

    #[test]
    fn topology_lists_every_rank() {
        let topo = SortConfig::for_elements(8).validate().unwrap();
        let roles: Vec<StageRole> = topo.stages().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![StageRole::Source, StageRole::Merge, StageRole::Merge, StageRole::Sink]
        );
        assert_eq!(topo.last_rank(), 3);
    }

    #[test]
    fn out_of_range_rank_rejected() {
        let topo = SortConfig::for_elements(4).validate().unwrap();
        assert_eq!(
            topo.stage(3).unwrap_err(),
            ConfigError::RankOutOfRange { rank: 3, last: 2 }
        );
    }

    #[test]
    fn config_deserializes() {
        let cfg: SortConfig =
            serde_json::from_str(r#"{"elements":4,"stages":3,"channel_capacity":1}"#).unwrap();
        assert_eq!(cfg, SortConfig::for_elements(4).with_channel_capacity(1));
    }
}
