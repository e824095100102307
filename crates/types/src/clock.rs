//! Lamport logical clock.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Lamport timestamp: the value of some machine's logical clock at the
/// moment an event was processed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LamportTime(pub u64);

impl LamportTime {
    /// The clock value before any event has been processed.
    pub const ZERO: Self = LamportTime(0);

    /// Get the raw value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LamportTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A machine's logical clock, implementing Lamport's update rules.
///
/// The clock is owned exclusively by its machine and is only ever advanced:
///
/// - [`tick`](Self::tick) for internal events and sends: `value += 1`. For a
///   send, the increment happens *before* the message is handed to the
///   fabric, so the value carried by the message is the post-increment one.
/// - [`observe`](Self::observe) for receives: `value = max(value, remote) + 1`.
///
/// Every update advances the value by at least 1, so the sequence of values
/// a machine records is strictly increasing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    /// Create a clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, without advancing.
    pub fn now(&self) -> LamportTime {
        LamportTime(self.value)
    }

    /// Advance for a local event (internal work or a send) and return the
    /// new value.
    pub fn tick(&mut self) -> LamportTime {
        self.value += 1;
        LamportTime(self.value)
    }

    /// Advance for a received message carrying `remote`, and return the new
    /// value: `max(local, remote) + 1`.
    pub fn observe(&mut self, remote: LamportTime) -> LamportTime {
        self.value = self.value.max(remote.0) + 1;
        LamportTime(self.value)
    }
}
