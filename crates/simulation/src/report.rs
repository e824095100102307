//! End-of-run report and the accounting helpers the tests and the CLI
//! summary are built on.

use driftlab_machine::MachineReport;
use driftlab_types::{EventKind, EventRecord, MachineId, SendTarget};
use serde::Serialize;
use std::time::Duration;

/// Everything a finished run leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Per-machine accounting, ordered by machine id.
    pub machines: Vec<MachineReport>,

    /// The emitted records, if the caller did not take the live stream.
    ///
    /// Per-machine emission order is preserved; the cross-machine interleave
    /// is arrival order at the collector.
    pub records: Vec<EventRecord>,

    /// Wall-clock time the whole run took, including shutdown.
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Records emitted by one machine, in emission order.
    pub fn records_for(&self, id: MachineId) -> impl Iterator<Item = &EventRecord> {
        self.records.iter().filter(move |r| r.machine == id)
    }

    /// Total RECEIVE events across all machines.
    pub fn receives(&self) -> usize {
        self.records.iter().filter(|r| r.kind.is_receive()).count()
    }

    /// Total SEND events across all machines (a broadcast counts once).
    pub fn sends(&self) -> usize {
        self.records.iter().filter(|r| r.kind.is_send()).count()
    }

    /// Total INTERNAL events across all machines.
    pub fn internals(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.kind == EventKind::Internal)
            .count()
    }

    /// Total messages enqueued into mailboxes, counting each broadcast as
    /// one copy per peer.
    pub fn deliveries(&self) -> usize {
        let peers_per_broadcast = self.machines.len().saturating_sub(1);
        self.records
            .iter()
            .filter_map(|r| match r.kind {
                EventKind::Send {
                    target: SendTarget::Peer(_),
                } => Some(1),
                EventKind::Send {
                    target: SendTarget::All,
                } => Some(peers_per_broadcast),
                _ => None,
            })
            .sum()
    }

    /// Messages still queued across all mailboxes at cutoff.
    pub fn total_undrained(&self) -> usize {
        self.machines.iter().map(|m| m.undrained).sum()
    }

    /// Difference between the highest and lowest final clock values: the
    /// inter-machine drift at the end of the run.
    pub fn clock_spread(&self) -> u64 {
        let clocks = self.machines.iter().map(|m| m.final_clock.get());
        match (clocks.clone().max(), clocks.min()) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        }
    }
}
