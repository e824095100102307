//! Online per-machine statistics over the record stream.

use driftlab_simulation::SimulationReport;
use driftlab_types::{EventKind, EventRecord, MachineId};
use hdrhistogram::errors::{CreationError, RecordError};
use hdrhistogram::Histogram;
use std::collections::{btree_map::Entry, BTreeMap};
use thiserror::Error;

/// Failures while consuming the record stream.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Histogram construction failed.
    #[error("failed to build histogram: {0}")]
    Histogram(#[from] CreationError),

    /// A queue length fell outside the histogram's trackable range.
    #[error("failed to record queue length: {0}")]
    Record(#[from] RecordError),

    /// A record could not be encoded as JSON.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

struct MachineSummary {
    internals: u64,
    sends: u64,
    receives: u64,
    max_queue: u64,
    queue_lengths: Histogram<u64>,
    last_clock: u64,
}

impl MachineSummary {
    fn new() -> Result<Self, SummaryError> {
        Ok(Self {
            internals: 0,
            sends: 0,
            receives: 0,
            max_queue: 0,
            queue_lengths: Histogram::new(3)?,
            last_clock: 0,
        })
    }
}

/// Aggregates the stream as it arrives, one record at a time.
#[derive(Default)]
pub struct RunSummary {
    machines: BTreeMap<MachineId, MachineSummary>,
    total_events: u64,
}

impl RunSummary {
    /// Fold one record into the summary.
    pub fn observe(&mut self, record: &EventRecord) -> Result<(), SummaryError> {
        let machine = match self.machines.entry(record.machine) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(MachineSummary::new()?),
        };
        match record.kind {
            EventKind::Internal => machine.internals += 1,
            EventKind::Send { .. } => machine.sends += 1,
            EventKind::Receive { queue_len, .. } => {
                machine.receives += 1;
                let queue_len = queue_len as u64;
                machine.queue_lengths.record(queue_len)?;
                machine.max_queue = machine.max_queue.max(queue_len);
            }
        }
        machine.last_clock = record.clock.get();
        self.total_events += 1;
        Ok(())
    }

    /// Print the per-machine table and run totals.
    pub fn print(&self, report: &SimulationReport) {
        println!();
        println!(
            "{:<12} {:>6} {:>7} {:>8} {:>9} {:>9} {:>9} {:>6} {:>6} {:>6} {:>9}",
            "machine",
            "rate",
            "ticks",
            "clock",
            "internal",
            "send",
            "receive",
            "q p50",
            "q p99",
            "q max",
            "undrained"
        );
        for machine in &report.machines {
            let Some(stats) = self.machines.get(&machine.id) else {
                continue;
            };
            println!(
                "{:<12} {:>6} {:>7} {:>8} {:>9} {:>9} {:>9} {:>6} {:>6} {:>6} {:>9}",
                machine.id.to_string(),
                machine.tick_rate.to_string(),
                machine.ticks,
                machine.final_clock.to_string(),
                stats.internals,
                stats.sends,
                stats.receives,
                stats.queue_lengths.value_at_quantile(0.50),
                stats.queue_lengths.value_at_quantile(0.99),
                stats.max_queue,
                machine.undrained,
            );
        }
        println!();
        println!("events:       {}", self.total_events);
        println!("clock spread: {}", report.clock_spread());
        println!("undrained:    {}", report.total_undrained());
        println!("elapsed:      {:.2?}", report.elapsed);
    }
}
