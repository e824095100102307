//! Construction and lifecycle of one run.

use crate::{ConfigError, SimulationConfig, SimulationReport};
use crossbeam::channel::{unbounded, Receiver};
use driftlab_fabric::{Fabric, Mailbox};
use driftlab_machine::{Machine, MachineConfig, MachineError};
use driftlab_types::{EventRecord, MachineId, TickRate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Failures of the run harness itself.
///
/// Configuration problems are caught earlier, in [`Simulation::new`];
/// anything here is fatal to the whole run and is surfaced, not swallowed.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The OS refused to spawn a machine thread.
    #[error("failed to spawn machine thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A machine's tick loop failed.
    #[error(transparent)]
    Machine(#[from] MachineError),

    /// A machine thread panicked.
    #[error("{0} panicked")]
    MachinePanicked(MachineId),
}

/// Derive the per-machine RNG seed from the run seed.
///
/// The golden-ratio multiplier keeps the per-machine streams distinct from
/// each other and from the rate-assignment stream, which uses the run seed
/// directly.
fn machine_seed(seed: u64, id: MachineId) -> u64 {
    seed ^ u64::from(id.0 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// A fully wired, not-yet-started run.
///
/// Construction validates the configuration, assigns tick rates, and wires
/// every machine into the shared fabric. [`Simulation::run`] then drives
/// the run to completion:
///
/// 1. spawn one named thread per machine,
/// 2. sleep for the configured duration,
/// 3. raise the stop flag,
/// 4. join every machine and finalize the mailbox counts.
pub struct Simulation {
    config: SimulationConfig,
    machines: Vec<Machine>,
    stop: Arc<AtomicBool>,
    events: Option<Receiver<EventRecord>>,
}

impl Simulation {
    /// Validate `config` and wire up the machines. No thread starts here.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let n = config.num_machines;

        // Rate assignment comes from its own config-seeded stream, so the
        // same seed always yields the same rates.
        let mut rate_rng = ChaCha8Rng::seed_from_u64(config.seed);
        let rates: Vec<TickRate> = match &config.tick_rates {
            Some(explicit) => explicit.iter().map(|&hz| TickRate::new(hz)).collect(),
            None => {
                let (min, max) = config.tick_rate_range;
                (0..n)
                    .map(|_| TickRate::new(rate_rng.gen_range(min..=max)))
                    .collect()
            }
        };

        let (event_tx, event_rx) = unbounded();

        let mut links = Vec::with_capacity(n);
        let mut mailboxes = Vec::with_capacity(n);
        for i in 0..n {
            let (tx, mailbox) = Mailbox::unbounded();
            links.push((MachineId(i as u32), tx));
            mailboxes.push(mailbox);
        }
        let fabric = Arc::new(Fabric::new(links));

        let machines = mailboxes
            .into_iter()
            .enumerate()
            .map(|(i, mailbox)| {
                let id = MachineId(i as u32);
                let machine_config = MachineConfig {
                    id,
                    tick_rate: rates[i],
                    peers: (0..n)
                        .filter(|&j| j != i)
                        .map(|j| MachineId(j as u32))
                        .collect(),
                    weights: config.weights,
                    seed: machine_seed(config.seed, id),
                };
                Machine::new(machine_config, mailbox, Arc::clone(&fabric), event_tx.clone())
            })
            .collect();

        Ok(Self {
            config,
            machines,
            stop: Arc::new(AtomicBool::new(false)),
            events: Some(event_rx),
        })
    }

    /// The configuration this run was built from.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The assigned tick rates, ordered by machine id.
    pub fn tick_rates(&self) -> Vec<TickRate> {
        self.machines.iter().map(|m| m.tick_rate()).collect()
    }

    /// Take the live record stream.
    ///
    /// Records arrive as they are produced, so a consumer sees partial runs
    /// too. Can be taken once; if it is never taken, the runner keeps the
    /// stream alive and [`SimulationReport::records`] holds everything at
    /// the end.
    pub fn take_events(&mut self) -> Option<Receiver<EventRecord>> {
        self.events.take()
    }

    /// Drive the run to completion and report.
    pub fn run(mut self) -> Result<SimulationReport, SimulationError> {
        let started = Instant::now();
        info!(
            machines = self.config.num_machines,
            duration = ?self.config.duration,
            seed = self.config.seed,
            "simulation starting"
        );

        let mut handles = Vec::with_capacity(self.machines.len());
        for machine in self.machines.drain(..) {
            let id = machine.id();
            let stop = Arc::clone(&self.stop);
            let handle = thread::Builder::new()
                .name(format!("machine-{}", id.0))
                .spawn(move || machine.run(stop))?;
            handles.push((id, handle));
        }

        thread::sleep(self.config.duration);
        self.stop.store(true, Ordering::Relaxed);

        let mut joined = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let result = handle
                .join()
                .map_err(|_| SimulationError::MachinePanicked(id))?;
            joined.push(result?);
        }

        // Every tick loop has stopped, so nothing can push anymore and the
        // mailbox counts are final. Messages sent after a receiver's own
        // cutoff are counted here, not lost.
        let machines = joined
            .into_iter()
            .map(|(mut report, mailbox)| {
                report.undrained = mailbox.len();
                report
            })
            .collect();

        let records = self
            .events
            .take()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default();

        let elapsed = started.elapsed();
        info!(?elapsed, "simulation finished");
        Ok(SimulationReport {
            machines,
            records,
            elapsed,
        })
    }
}
