//! driftlab CLI
//!
//! Runs one simulation with the given parameters, consumes the record
//! stream live, and prints a per-machine summary (optionally echoing every
//! record as a JSON line for offline analysis).

mod summary;

use clap::Parser;
use driftlab_simulation::{ActionWeights, Simulation, SimulationConfig};
use summary::{RunSummary, SummaryError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "driftlab")]
#[command(about = "Lamport logical clock simulation")]
#[command(version)]
struct Cli {
    /// Number of machines
    #[arg(long, default_value = "3")]
    machines: usize,

    /// Run duration (e.g. "60s", "2m")
    #[arg(short, long, default_value = "60s")]
    duration: humantime::Duration,

    /// Random seed (fixes tick rates and every machine's action sequence)
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Minimum tick rate in ticks per second
    #[arg(long, default_value = "1")]
    min_rate: u32,

    /// Maximum tick rate in ticks per second
    #[arg(long, default_value = "6")]
    max_rate: u32,

    /// Explicit per-machine tick rates, comma-separated (overrides the range)
    #[arg(long, value_delimiter = ',')]
    rates: Option<Vec<u32>>,

    /// Weight of internal events in the action mix (sends stay at 1/1/1)
    #[arg(long, default_value = "7")]
    internal_weight: u32,

    /// Emit every event record as a JSON line on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = SimulationConfig::new(cli.machines, cli.duration.into())
        .with_tick_rate_range(cli.min_rate, cli.max_rate)
        .with_weights(ActionWeights::default().with_internal(cli.internal_weight))
        .with_seed(cli.seed);
    if let Some(rates) = cli.rates {
        config = config.with_tick_rates(rates);
    }

    let mut sim = Simulation::new(config)?;
    let stream = sim.take_events().ok_or("event stream already taken")?;

    // Consume the stream while the run is in flight; the iterator ends when
    // the last machine stops.
    let json = cli.json;
    let collector = std::thread::spawn(move || -> Result<RunSummary, SummaryError> {
        let mut summary = RunSummary::default();
        for record in stream.iter() {
            if json {
                println!("{}", serde_json::to_string(&record)?);
            }
            summary.observe(&record)?;
        }
        Ok(summary)
    });

    let report = sim.run()?;
    let summary = collector
        .join()
        .map_err(|_| "record collector panicked")??;

    summary.print(&report);
    Ok(())
}
