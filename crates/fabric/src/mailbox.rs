//! Per-machine inbound message queue.

use crossbeam::channel::{self, Receiver, Sender};
use driftlab_types::Message;
use thiserror::Error;

/// Error returned when pushing into a mailbox whose owner is gone.
///
/// This cannot happen while a run is in progress: machines keep their
/// mailboxes alive until after every tick loop has stopped.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("mailbox closed: owning machine has shut down")]
pub struct MailboxClosed;

/// The write half of a mailbox. Cloneable; held by peer machines (via the
/// fabric), any number of which may push concurrently.
#[derive(Debug, Clone)]
pub struct MailboxSender {
    tx: Sender<Message>,
}

impl MailboxSender {
    /// Append a message at the tail.
    ///
    /// Never blocks and never drops: the queue is unbounded. Fails only if
    /// the owning machine's [`Mailbox`] has been dropped.
    pub fn push(&self, message: Message) -> Result<(), MailboxClosed> {
        self.tx.send(message).map_err(|_| MailboxClosed)
    }
}

/// The read half of a mailbox, owned by exactly one machine.
///
/// Insertion order is arrival order: FIFO per sender, arrival-determined
/// across senders.
#[derive(Debug)]
pub struct Mailbox {
    rx: Receiver<Message>,
}

impl Mailbox {
    /// Create an unbounded mailbox, returning the write and read halves.
    pub fn unbounded() -> (MailboxSender, Mailbox) {
        let (tx, rx) = channel::unbounded();
        (MailboxSender { tx }, Mailbox { rx })
    }

    /// Remove and return the head message, or `None` if the mailbox is
    /// currently empty. Never blocks.
    pub fn try_pop(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Number of messages currently queued.
    ///
    /// A snapshot: concurrent pushes may land immediately after, but the
    /// count never exceeds the messages actually present.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if the mailbox is currently empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
