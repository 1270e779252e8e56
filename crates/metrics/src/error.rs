use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while producing a run report.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run window is inverted: finish {finish} precedes start {start}")]
    InvertedWindow { start: String, finish: String },
}
