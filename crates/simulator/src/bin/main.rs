//! Order-mesh simulator CLI
//!
//! Run a gossip order-propagation experiment over several seeds and print the
//! aggregated report.
//!
//! # Example
//!
//! ```bash
//! # Defaults, four runs
//! meshsim
//!
//! # Experiment file with overrides
//! meshsim -c configs/default.toml --seed 42 --runs 16 --threads 8
//!
//! # Machine-readable output
//! meshsim -c configs/default.toml --json > report.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use meshsim_simulator::{Execution, ExecutionConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Order-mesh simulator
///
/// Runs deterministic round-based simulations. Reproducible when the same
/// configuration and seed are used, whatever the thread count.
#[derive(Parser, Debug)]
#[command(name = "meshsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Experiment file (TOML). Built-in defaults apply when omitted.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Base seed. Run i derives its own seed from it.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of independent runs
    #[arg(short = 'r', long)]
    runs: Option<usize>,

    /// Worker threads (default: one per core)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Rounds to simulate per run
    #[arg(long)]
    horizon: Option<u64>,

    /// Print the report as JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,meshsim_simulator=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ExecutionConfig::from_toml_file(path)
            .with_context(|| format!("loading experiment {}", path.display()))?,
        None => ExecutionConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(runs) = args.runs {
        config = config.with_runs(runs);
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(horizon) = args.horizon {
        config = config.with_horizon(horizon);
    }

    info!(
        runs = config.runs,
        seed = config.sim.seed,
        horizon = config.sim.horizon,
        batch_period = config.sim.batch_period,
        min_neighbors = config.sim.bounds.min,
        max_neighbors = config.sim.bounds.max,
        "Starting experiment"
    );

    let execution = Execution::new(config).context("invalid experiment")?;
    let report = execution.run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }
    Ok(())
}
