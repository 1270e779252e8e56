//! Plain-text run report.

use crate::aborts::AbortSummary;
use crate::epoch::EpochBreakdown;
use crate::error::MetricsError;
use crate::stats::LatencySummary;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const RULE: &str = "===========================================";
const THROUGHPUT_RULE: &str = "=====================================================";
const FOOTER: &str = "=================    THE END   ================";

/// Overall throughput of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSummary {
    pub seconds: f64,
    pub completed: u64,
    pub per_second: f64,
}

/// Everything written to a report file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    pub summaries: Vec<LatencySummary>,
    pub throughput: ThroughputSummary,
    pub epochs: Option<EpochBreakdown>,
    /// Absent in throughput-only reports.
    pub aborts: Option<AbortSummary>,
    pub anomalies: usize,
}

impl RunReport {
    /// `"{run_name}.txt"`, or `"results_{start unix ms}.txt"` without a name.
    pub fn file_name(run_name: Option<&str>, start: DateTime<Utc>) -> String {
        match run_name {
            Some(name) => format!("{name}.txt"),
            None => format!("results_{}.txt", start.timestamp_millis()),
        }
    }

    /// Write the report into `dir` and return the file path.
    pub fn write_to(&self, dir: &Path, run_name: Option<&str>) -> Result<PathBuf, MetricsError> {
        let path = dir.join(Self::file_name(run_name, self.start));
        fs::create_dir_all(dir).map_err(|source| MetricsError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        fs::write(&path, self.to_string()).map_err(|source| MetricsError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn write_summaries(f: &mut fmt::Formatter<'_>, summaries: &[LatencySummary]) -> fmt::Result {
    for summary in summaries {
        writeln!(
            f,
            "Transaction: {} - #{} - Average end-to-end latency: {}",
            summary.tx_type, summary.count, summary.average
        )?;
        for (percentile, value) in &summary.percentiles {
            writeln!(
                f,
                "Transaction: {} - #{} - {}th percentile end-to-end latency: {}",
                summary.tx_type, summary.count, percentile, value
            )?;
        }
    }
    Ok(())
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run from {} to {}", self.start, self.finish)?;
        writeln!(f, "{RULE}")?;

        write_summaries(f, &self.summaries)?;

        writeln!(f, "Number of seconds: {}", self.throughput.seconds)?;
        writeln!(
            f,
            "Number of completed transactions: {}",
            self.throughput.completed
        )?;
        writeln!(f, "Transactions per second: {}", self.throughput.per_second)?;
        writeln!(f, "{THROUGHPUT_RULE}")?;

        if let Some(epochs) = &self.epochs {
            writeln!(
                f,
                "{} blocks for epoch {}",
                epochs.blocks.len(),
                epochs.epoch_ms
            )?;
            for block in &epochs.blocks {
                writeln!(f, "Block {} results:", block.index)?;
                write_summaries(f, &block.summaries)?;
                writeln!(f, "Number of completed transactions: {}", block.completed)?;
                writeln!(f, "Transactions per second: {}", block.throughput)?;
                writeln!(f, "{RULE}")?;
            }
        }

        if let Some(aborts) = &self.aborts {
            writeln!(f, "================== Aborts ==================")?;
            for (tx_type, count) in &aborts.counts {
                writeln!(f, "Transaction: {tx_type}: {count}")?;
            }
            if aborts.retries() > 0 {
                writeln!(f, "Retried requests before abort: {}", aborts.retries())?;
            }
            writeln!(f, "{RULE}")?;
        }

        if self.anomalies > 0 {
            writeln!(f, "================== Anomalies ==================")?;
            writeln!(f, "Number of collected anomalies: {}", self.anomalies)?;
        }

        writeln!(f, "{FOOTER}")
    }
}
