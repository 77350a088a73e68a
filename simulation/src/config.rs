//! Simulation configuration

use std::path::Path;
use std::time::Duration;

use ghs_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::delay::{DelaySource, FixedDelay, UniformDelay, node_seed};
use crate::error::{SimResult, SimulationError};

/// How per-message transit delays are drawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayModel {
    /// Uniform over `min..=max` rounds
    Uniform { min: u64, max: u64 },
    /// Always `rounds` rounds
    Fixed { rounds: u64 },
}

impl Default for DelayModel {
    fn default() -> Self {
        DelayModel::Uniform { min: 1, max: 19 }
    }
}

impl DelayModel {
    /// Build the delay source for one node
    pub fn source_for(&self, node: NodeId, seed: Option<u64>) -> Box<dyn DelaySource> {
        match *self {
            DelayModel::Uniform { min, max } => Box::new(UniformDelay::new(
                min,
                max,
                seed.map(|seed| node_seed(seed, node)),
            )),
            DelayModel::Fixed { rounds } => Box::new(FixedDelay(rounds)),
        }
    }
}

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Transit delay model
    pub delay: DelayModel,
    /// Run seed (None = OS entropy, runs are not reproducible)
    pub seed: Option<u64>,
    /// Round ceiling; nodes still running at this round are forced to exit
    pub max_rounds: Option<u64>,
    /// Fail the run if a barrier wait takes longer than this
    pub barrier_timeout_ms: Option<u64>,
    /// Record every send for replay
    pub record_trace: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            delay: DelayModel::default(),
            seed: None,
            max_rounds: Some(100_000),
            barrier_timeout_ms: None,
            record_trace: false,
        }
    }
}

impl SimConfig {
    /// Default config with a fixed seed
    pub fn deterministic(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Set the delay model
    pub fn with_delay(mut self, delay: DelayModel) -> Self {
        self.delay = delay;
        self
    }

    /// Set the round ceiling
    pub fn with_max_rounds(mut self, max_rounds: Option<u64>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the barrier timeout
    pub fn with_barrier_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.barrier_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Enable or disable trace recording
    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    pub fn barrier_timeout(&self) -> Option<Duration> {
        self.barrier_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings that cannot produce a run
    pub fn validate(&self) -> SimResult<()> {
        if let DelayModel::Uniform { min, max } = self.delay {
            if min > max {
                return Err(SimulationError::InvalidConfig(format!(
                    "delay range {}..={} is empty",
                    min, max
                )));
            }
        }
        if self.max_rounds == Some(0) {
            return Err(SimulationError::InvalidConfig(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        if self.barrier_timeout_ms == Some(0) {
            return Err(SimulationError::InvalidConfig(
                "barrier_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.delay, DelayModel::Uniform { min: 1, max: 19 });
        assert_eq!(config.max_rounds, Some(100_000));
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let config = SimConfig::default().with_delay(DelayModel::Uniform { min: 5, max: 2 });
        assert!(matches!(config.validate(), Err(SimulationError::InvalidConfig(_))));

        let config = SimConfig::default().with_max_rounds(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: SimConfig =
            serde_json::from_str(r#"{ "seed": 3, "delay": { "kind": "fixed", "rounds": 2 } }"#)
                .unwrap();
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.delay, DelayModel::Fixed { rounds: 2 });
        assert_eq!(config.max_rounds, Some(100_000));
    }

    #[test]
    fn test_seeded_sources_are_reproducible() {
        let model = DelayModel::Uniform { min: 1, max: 19 };
        let mut a = model.source_for(NodeId(4), Some(11));
        let mut b = model.source_for(NodeId(4), Some(11));
        for _ in 0..20 {
            assert_eq!(a.next_delay(NodeId(0)), b.next_delay(NodeId(0)));
        }
    }
}
