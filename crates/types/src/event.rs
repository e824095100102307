//! Event records emitted by a run.

use crate::{LamportTime, MachineId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Destination of a send action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendTarget {
    /// A single peer machine.
    Peer(MachineId),

    /// Every other machine (one clock increment shared by all copies).
    All,
}

impl fmt::Display for SendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTarget::Peer(id) => write!(f, "{id}"),
            SendTarget::All => write!(f, "ALL"),
        }
    }
}

/// The three kinds of events a machine can process on a tick.
///
/// This is a closed set: the tick loop dispatches on exactly one of these
/// per tick, and nothing else ever happens to a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Local work; the clock advanced by 1.
    Internal,

    /// A message (or a broadcast batch) was handed to the fabric.
    Send {
        /// Where the message went.
        target: SendTarget,
    },

    /// A message was dequeued from the mailbox.
    Receive {
        /// The machine that sent the message.
        from: MachineId,

        /// Mailbox length immediately after the dequeue.
        queue_len: usize,
    },
}

impl EventKind {
    /// Get a human-readable name for this event kind.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Internal => "INTERNAL",
            EventKind::Send { .. } => "SEND",
            EventKind::Receive { .. } => "RECEIVE",
        }
    }

    /// Check if this is a send event.
    pub fn is_send(&self) -> bool {
        matches!(self, EventKind::Send { .. })
    }

    /// Check if this is a receive event.
    pub fn is_receive(&self) -> bool {
        matches!(self, EventKind::Receive { .. })
    }
}

/// One append-only log entry, produced once per processed tick-event.
///
/// Records are emitted in tick order per machine; no cross-machine order is
/// implied beyond what the logical and wall clocks let an analyzer recover
/// after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// The machine that processed the event.
    pub machine: MachineId,

    /// Wall-clock time at emission.
    pub wall_clock: SystemTime,

    /// What happened.
    pub kind: EventKind,

    /// The machine's logical clock value after the event.
    pub clock: LamportTime,
}

impl EventRecord {
    /// Create a record stamped with the current wall-clock time.
    pub fn now(machine: MachineId, kind: EventKind, clock: LamportTime) -> Self {
        Self {
            machine,
            wall_clock: SystemTime::now(),
            kind,
            clock,
        }
    }
}
