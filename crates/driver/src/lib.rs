//! Experiment driver for the marketplace benchmark.
//!
//! Loads an [`ExperimentConfig`] from TOML and executes each of its runs on a
//! fresh simulated platform: the transaction scheduler generates the workload
//! for the configured execution time, then the metric collector drains the
//! ports and writes one report per run.

mod config;
mod error;
mod experiment;

pub use config::{
    CompletionMode, ExperimentConfig, MixEntry, PlatformSection, RunSection, WorkloadSection,
};
pub use error::{ConfigError, DriverError};
pub use experiment::{run_name, Experiment, RunOutcome};
