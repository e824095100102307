//! Routing between machines.

use crate::MailboxSender;
use driftlab_types::{MachineId, Message};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;

/// Delivery failure.
///
/// The fabric is non-lossy by contract: once a run is validated and
/// started, neither variant can occur. They exist so that a wiring bug or a
/// prematurely dropped mailbox surfaces as a hard error instead of a silent
/// drop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// No mailbox is registered for the target machine.
    #[error("no route to {0}")]
    UnknownMachine(MachineId),

    /// The target's mailbox was dropped while the run was still going.
    #[error("mailbox of {0} is closed")]
    MailboxClosed(MachineId),
}

/// Point-to-point delivery channels connecting every pair of machines.
///
/// One fabric is shared (behind an `Arc`) by all machines in a run. It holds
/// the write half of every mailbox and routes by machine id; it never
/// synchronizes sender and receiver, and it never blocks.
#[derive(Debug)]
pub struct Fabric {
    links: BTreeMap<MachineId, MailboxSender>,
}

impl Fabric {
    /// Build a fabric from one mailbox sender per machine.
    pub fn new(links: impl IntoIterator<Item = (MachineId, MailboxSender)>) -> Self {
        Self {
            links: links.into_iter().collect(),
        }
    }

    /// Number of machines wired into the fabric.
    pub fn num_machines(&self) -> usize {
        self.links.len()
    }

    /// All machine ids, in ascending order.
    pub fn machine_ids(&self) -> impl Iterator<Item = MachineId> + '_ {
        self.links.keys().copied()
    }

    /// Enqueue `message` into the mailbox of `to`.
    pub fn send(&self, to: MachineId, message: Message) -> Result<(), DeliveryError> {
        let link = self
            .links
            .get(&to)
            .ok_or(DeliveryError::UnknownMachine(to))?;
        link.push(message)
            .map_err(|_| DeliveryError::MailboxClosed(to))?;
        trace!(from = %message.sender, %to, at = %message.sent_at, "delivered");
        Ok(())
    }

    /// Enqueue a copy of `message` into every mailbox except the sender's.
    ///
    /// Copies are enqueued one target at a time; there is no atomic
    /// cross-target visibility, only eventual delivery to each.
    pub fn broadcast(&self, from: MachineId, message: Message) -> Result<(), DeliveryError> {
        for (&to, link) in &self.links {
            if to == from {
                continue;
            }
            link.push(message)
                .map_err(|_| DeliveryError::MailboxClosed(to))?;
        }
        trace!(%from, at = %message.sent_at, "broadcast delivered");
        Ok(())
    }
}
