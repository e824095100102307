//! Run configuration and fail-fast validation.

use driftlab_machine::ActionWeights;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration, detected before any machine starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Fewer than two machines: there would be nobody to talk to.
    #[error("at least 2 machines are required, got {0}")]
    TooFewMachines(usize),

    /// A zero-length run.
    #[error("run duration must be non-zero")]
    ZeroDuration,

    /// The random tick-rate range is empty or contains zero.
    #[error("tick rate range [{min}, {max}] is empty")]
    EmptyTickRateRange {
        /// Lower bound as configured.
        min: u32,
        /// Upper bound as configured.
        max: u32,
    },

    /// An all-zero action distribution has nothing to draw from.
    #[error("action weights must not all be zero")]
    ZeroActionWeights,

    /// Explicit per-machine rates were given for the wrong machine count.
    #[error("expected {expected} explicit tick rates, got {got}")]
    TickRateCountMismatch {
        /// Machines in the run.
        expected: usize,
        /// Rates provided.
        got: usize,
    },

    /// An explicit tick rate of zero.
    #[error("explicit tick rates must be non-zero")]
    ZeroTickRate,
}

/// Configuration for one simulation run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of machines.
    pub num_machines: usize,

    /// How long the run lasts before the stop signal is raised.
    pub duration: Duration,

    /// Inclusive range tick rates are drawn from, in ticks per second.
    pub tick_rate_range: (u32, u32),

    /// Explicit per-machine tick rates, overriding the random draw.
    ///
    /// Used by experiments that pin rates (homogeneous-rate drift runs,
    /// slow-machine bottleneck runs). Must have exactly `num_machines`
    /// entries when set.
    pub tick_rates: Option<Vec<u32>>,

    /// The action distribution every machine draws from.
    pub weights: ActionWeights,

    /// Seed for tick-rate assignment and the per-machine RNGs. Fixing the
    /// seed fixes every machine's action sequence.
    pub seed: u64,
}

impl SimulationConfig {
    /// Create a configuration with the classic defaults: rates drawn from
    /// [1, 6], the 1/1/1/7 action mix, and a fixed seed.
    pub fn new(num_machines: usize, duration: Duration) -> Self {
        Self {
            num_machines,
            duration,
            tick_rate_range: (1, 6),
            tick_rates: None,
            weights: ActionWeights::default(),
            seed: 12345,
        }
    }

    /// Set the tick-rate range.
    pub fn with_tick_rate_range(mut self, min: u32, max: u32) -> Self {
        self.tick_rate_range = (min, max);
        self
    }

    /// Pin every machine's tick rate explicitly.
    pub fn with_tick_rates(mut self, rates: Vec<u32>) -> Self {
        self.tick_rates = Some(rates);
        self
    }

    /// Set the action distribution.
    pub fn with_weights(mut self, weights: ActionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate, failing fast before any machine is constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_machines < 2 {
            return Err(ConfigError::TooFewMachines(self.num_machines));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.weights.total() == 0 {
            return Err(ConfigError::ZeroActionWeights);
        }
        match &self.tick_rates {
            Some(rates) => {
                if rates.len() != self.num_machines {
                    return Err(ConfigError::TickRateCountMismatch {
                        expected: self.num_machines,
                        got: rates.len(),
                    });
                }
                if rates.iter().any(|&rate| rate == 0) {
                    return Err(ConfigError::ZeroTickRate);
                }
            }
            None => {
                let (min, max) = self.tick_rate_range;
                if min == 0 || min > max {
                    return Err(ConfigError::EmptyTickRateRange { min, max });
                }
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(60))
    }
}
