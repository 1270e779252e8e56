//! Marketplace benchmark CLI
//!
//! Runs the experiments of a TOML configuration against the simulated
//! marketplace and writes one report per run.

use anyhow::Context;
use clap::{Parser, Subcommand};
use marketbench_driver::{Experiment, ExperimentConfig};
use marketbench_types::ConcurrencyType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "marketbench")]
#[command(about = "Transactional workload driver for marketplace platforms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every run of an experiment configuration
    Run {
        /// Experiment configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Execution time of each run (e.g., "30s", "5m")
        #[arg(short, long)]
        duration: Option<humantime::Duration>,

        /// Worker threads (open) or transactions in flight (closed)
        #[arg(long)]
        concurrency_level: Option<usize>,

        /// Concurrency type (open, closed)
        #[arg(long, value_parser = parse_concurrency_type)]
        concurrency_type: Option<ConcurrencyType>,

        /// Epoch period of the per-epoch breakdown, "0s" to disable
        #[arg(long)]
        epoch: Option<humantime::Duration>,

        /// Directory reports are written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the parsed configuration with defaults filled in
    PrintConfig {
        /// Experiment configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn parse_concurrency_type(s: &str) -> Result<ConcurrencyType, String> {
    match s.to_lowercase().as_str() {
        "open" | "continuous" => Ok(ConcurrencyType::Open),
        "closed" | "control" => Ok(ConcurrencyType::Closed),
        _ => Err(format!(
            "Invalid concurrency type '{}'. Use: open, closed",
            s
        )),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::PrintConfig { config } => {
            // No tracing: output goes to stdout
            let config = ExperimentConfig::from_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            print!("{}", config.to_toml()?);
        }

        Commands::Run {
            config,
            duration,
            concurrency_level,
            concurrency_type,
            epoch,
            output_dir,
        } => {
            init_tracing();

            let mut experiment = ExperimentConfig::from_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            if let Some(duration) = duration {
                experiment = experiment.with_execution_time(duration.into());
            }
            if let Some(level) = concurrency_level {
                experiment = experiment.with_concurrency_level(level);
            }
            if let Some(concurrency_type) = concurrency_type {
                experiment = experiment.with_concurrency_type(concurrency_type);
            }
            if let Some(epoch) = epoch {
                experiment = experiment.with_epoch_period(epoch.into());
            }
            if let Some(output_dir) = output_dir {
                experiment = experiment.with_output_dir(output_dir);
            }

            let outcomes = Experiment::new(experiment)?.run()?;
            for outcome in &outcomes {
                println!("{}", outcome.collected.path.display());
            }
        }
    }

    Ok(())
}
