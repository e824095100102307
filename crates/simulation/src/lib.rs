//! Simulation runner for driftlab.
//!
//! Wires N machines into a shared fabric, runs their tick loops on
//! independent threads for a configured duration, and streams the event
//! records they emit.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Simulation                          │
//! │                                                           │
//! │   ┌─────────┐   ┌─────────┐        ┌─────────┐            │
//! │   │Machine 0│   │Machine 1│  ...   │Machine N│  threads   │
//! │   └────┬────┘   └────┬────┘        └────┬────┘            │
//! │        │ send        │                  │                 │
//! │        ▼             ▼                  ▼                 │
//! │   ┌───────────────────────────────────────────┐           │
//! │   │      Fabric (one mailbox per machine)     │           │
//! │   └───────────────────────────────────────────┘           │
//! │        │ EventRecord per processed tick                   │
//! │        ▼                                                  │
//! │   record stream ──► external logging / analysis           │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no global lock-step and no flow control: machines never wait on
//! each other, and a slow machine's mailbox grows without bound under load.
//! That buildup, and the clock drift between machines, is what the emitted
//! records exist to measure.

mod config;
mod report;
mod runner;

pub use config::{ConfigError, SimulationConfig};
pub use report::SimulationReport;
pub use runner::{Simulation, SimulationError};

// Re-exports for convenience.
pub use driftlab_machine::{Action, ActionWeights, MachineConfig, MachineReport};
pub use driftlab_types::{
    EventKind, EventRecord, LamportTime, MachineId, Message, SendTarget, TickRate,
};
