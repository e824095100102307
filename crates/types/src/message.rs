//! The single message type exchanged between machines.

use crate::{LamportTime, MachineId};
use serde::{Deserialize, Serialize};

/// A message in flight between two machines.
///
/// Carries only the sender's identity and the sender's logical clock value
/// at the moment of the send (post-increment). Messages are immutable:
/// created on a send action, consumed exactly once on dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The machine that sent this message.
    pub sender: MachineId,

    /// The sender's clock value when the message was handed to the fabric.
    pub sent_at: LamportTime,
}

impl Message {
    /// Create a new message.
    pub fn new(sender: MachineId, sent_at: LamportTime) -> Self {
        Self { sender, sent_at }
    }
}
