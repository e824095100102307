//! The randomized action policy for ticks with an empty mailbox.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// What a machine does on a tick when no message is waiting.
///
/// A closed set, consumed by a single dispatch in the tick loop. `SendFirst`
/// and `SendSecond` address the machine's peer list by index; an index past
/// the end of the list (a two-machine run drawing `SendSecond`) degenerates
/// to `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Send to the peer at index 0.
    SendFirst,

    /// Send to the peer at index 1.
    SendSecond,

    /// Send to every other machine, with one shared clock increment.
    Broadcast,

    /// Local work only.
    Internal,
}

/// Discrete distribution over [`Action`]s.
///
/// The default weights (1, 1, 1, 7) reproduce the classic uniform draw over
/// 1..=10 where 1 and 2 are single sends, 3 is a broadcast, and 4..=10 are
/// internal events. Experiments vary the mix by changing weights, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWeights {
    /// Weight of sending to the first peer.
    pub send_first: u32,

    /// Weight of sending to the second peer.
    pub send_second: u32,

    /// Weight of broadcasting to all peers.
    pub broadcast: u32,

    /// Weight of an internal event.
    pub internal: u32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            send_first: 1,
            send_second: 1,
            broadcast: 1,
            internal: 7,
        }
    }
}

impl ActionWeights {
    /// Map the legacy `internal_event_range = (lo, hi)` parameterization:
    /// send weights stay at 1 each and the internal weight becomes the size
    /// of the range, so `(4, 10)` is the default mix and `(4, 5)` halves the
    /// internal-event probability relative to sends.
    pub fn from_internal_range(lo: u32, hi: u32) -> Self {
        Self {
            internal: hi.saturating_sub(lo).saturating_add(1),
            ..Self::default()
        }
    }

    /// Keep the send weights, replace the internal weight.
    pub fn with_internal(mut self, internal: u32) -> Self {
        self.internal = internal;
        self
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        u64::from(self.send_first)
            + u64::from(self.send_second)
            + u64::from(self.broadcast)
            + u64::from(self.internal)
    }

    /// Draw one action.
    ///
    /// Requires `total() > 0`, which configuration validation guarantees.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Action {
        let mut x = rng.gen_range(0..self.total());
        for (weight, action) in [
            (self.send_first, Action::SendFirst),
            (self.send_second, Action::SendSecond),
            (self.broadcast, Action::Broadcast),
        ] {
            if x < u64::from(weight) {
                return action;
            }
            x -= u64::from(weight);
        }
        Action::Internal
    }
}
