//! Error types for the experiment driver.

use marketbench_metrics::MetricsError;
use marketbench_types::SamplerError;
use marketbench_workload::WorkloadError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating an experiment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse experiment config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render experiment config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid experiment config: {0}")]
    Invalid(String),

    #[error("Invalid transaction distribution: {0}")]
    Mix(#[from] WorkloadError),
}

/// Errors that abort an experiment.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build simulated platform: {0}")]
    Platform(#[from] SamplerError),

    #[error("Run failed: {0}")]
    Workload(#[from] WorkloadError),

    #[error("Metric collection failed: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Failed to start completion pump: {0}")]
    CompletionPump(#[source] std::io::Error),
}
