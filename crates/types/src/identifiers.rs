//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Machine identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MachineId(pub u32);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Machine({})", self.0)
    }
}

/// Tick rate in ticks per second.
///
/// A machine executes exactly one event per tick, so this is the machine's
/// event throughput ceiling. Rates are clamped to at least 1 tick/second;
/// a zero rate would mean a machine that never runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TickRate(u32);

impl TickRate {
    /// Minimum tick rate.
    pub const MIN: Self = TickRate(1);

    /// Create from ticks per second, ensuring the rate is at least 1.
    pub fn new(ticks_per_second: u32) -> Self {
        TickRate(ticks_per_second.max(1))
    }

    /// Get the raw ticks-per-second value.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// The interval between consecutive tick boundaries.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.0))
    }
}

impl fmt::Display for TickRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_rate_clamps_to_minimum() {
        assert_eq!(TickRate::new(0), TickRate::MIN);
        assert_eq!(TickRate::new(1), TickRate::MIN);
        assert_eq!(TickRate::new(6).get(), 6);
    }

    #[test]
    fn test_tick_rate_period() {
        assert_eq!(TickRate::new(1).period(), Duration::from_secs(1));
        assert_eq!(TickRate::new(4).period(), Duration::from_millis(250));
    }

    #[test]
    fn test_machine_id_display() {
        assert_eq!(MachineId(2).to_string(), "Machine(2)");
    }
}
