//! Message delivery plumbing.
//!
//! Each machine owns one [`Mailbox`]; its peers hold cloned
//! [`MailboxSender`]s, bundled into a shared [`Fabric`] that routes by
//! [`MachineId`](driftlab_types::MachineId). Delivery is asynchronous with
//! respect to both sender and receiver tick rates: a push never blocks, a
//! pop never waits, and the queue in between is unbounded.
//!
//! Guarantees:
//!
//! - **No loss, no duplication**: every pushed message is popped exactly
//!   once (or is still queued when the run is cut off).
//! - **FIFO per sender**: messages from one sender arrive in send order.
//!   Cross-sender order is arrival order and is not specified.
//!
//! The unbounded queue is deliberate: queue buildup on slow machines is the
//! phenomenon under study, and a capacity bound would mask it.

mod fabric;
mod mailbox;

pub use fabric::{DeliveryError, Fabric};
pub use mailbox::{Mailbox, MailboxClosed, MailboxSender};
