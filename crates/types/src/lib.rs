//! Core types for the driftlab simulation.
//!
//! Everything in this crate is a plain value type: identifiers, the Lamport
//! clock and its timestamps, the wire message, and the event records a run
//! emits. No concurrency, no I/O.

mod clock;
mod event;
mod identifiers;
mod message;

pub use clock::{LamportClock, LamportTime};
pub use event::{EventKind, EventRecord, SendTarget};
pub use identifiers::{MachineId, TickRate};
pub use message::Message;
