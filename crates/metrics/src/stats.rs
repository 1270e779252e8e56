//! Per-type latency statistics.

use marketbench_types::{Latency, TransactionType};
use std::collections::BTreeMap;
use tracing::warn;

/// Percentiles reported for every transaction type.
pub const PERCENTILES: [u32; 3] = [50, 75, 90];

/// Latency statistics of one transaction type.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub tx_type: TransactionType,
    pub count: usize,
    /// Mean latency in ms, 0 when there are no samples.
    pub average: f64,
    /// `(percentile, ms)` pairs. Empty unless `count > 0` and `average > 0`.
    pub percentiles: Vec<(u32, f64)>,
}

impl LatencySummary {
    /// Summarize the samples of one type.
    pub fn from_samples(tx_type: TransactionType, mut samples: Vec<f64>) -> Self {
        let count = samples.len();
        let average = if count > 0 {
            samples.iter().sum::<f64>() / count as f64
        } else {
            0.0
        };

        let percentiles = if count > 0 && average > 0.0 {
            samples.sort_by(f64::total_cmp);
            PERCENTILES
                .iter()
                .map(|&p| (p, percentile_sorted(&samples, p)))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            tx_type,
            count,
            average,
            percentiles,
        }
    }
}

/// One summary per executable transaction type, in declaration order.
pub fn summarize_by_type<'a, I>(latencies: I) -> Vec<LatencySummary>
where
    I: IntoIterator<Item = &'a Latency>,
{
    let mut samples: BTreeMap<TransactionType, Vec<f64>> = TransactionType::EXECUTABLE
        .iter()
        .map(|t| (*t, Vec::new()))
        .collect();
    for latency in latencies {
        samples.entry(latency.tx_type).or_default().push(latency.millis);
    }

    TransactionType::EXECUTABLE
        .iter()
        .map(|t| LatencySummary::from_samples(*t, samples.remove(t).unwrap_or_default()))
        .collect()
}

/// Percentile `p` (0 to 100) of ascending `sorted` samples.
///
/// Uses the approximately median-unbiased estimator (Hyndman and Fan type 8):
/// `h = (n + 1/3) q + 1/3` over one-based order statistics, interpolated
/// linearly and clamped to the extremes.
pub fn percentile_sorted(sorted: &[f64], p: u32) -> f64 {
    let n = sorted.len();
    match n {
        0 => return f64::NAN,
        1 => return sorted[0],
        _ => {}
    }

    let q = f64::from(p.min(100)) / 100.0;
    let h = (n as f64 + 1.0 / 3.0) * q + 1.0 / 3.0;
    if h <= 1.0 {
        return sorted[0];
    }
    if h >= n as f64 {
        return sorted[n - 1];
    }

    let lower = h.floor();
    let idx = lower as usize - 1;
    sorted[idx] + (h - lower) * (sorted[idx + 1] - sorted[idx])
}

/// Completed transactions per second, 0 (with a warning) when none completed.
pub fn throughput(completed: u64, seconds: f64) -> f64 {
    if completed == 0 {
        warn!("Number of completed transactions is 0");
        return 0.0;
    }
    if seconds <= 0.0 {
        return 0.0;
    }
    completed as f64 / seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use marketbench_types::Tid;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_percentile_type_8() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile_sorted(&sorted, 50), 2.5));
        assert!(close(percentile_sorted(&sorted, 75), 3.0 + 7.0 / 12.0));
        assert!(close(percentile_sorted(&sorted, 90), 4.0));
        assert!(close(percentile_sorted(&sorted, 0), 1.0));
        assert!(close(percentile_sorted(&[7.0], 90), 7.0));
    }

    #[test]
    fn test_summary_skips_percentiles_without_positive_average() {
        let empty = LatencySummary::from_samples(TransactionType::PriceUpdate, Vec::new());
        assert_eq!(empty.count, 0);
        assert_eq!(empty.average, 0.0);
        assert!(empty.percentiles.is_empty());

        let zeros = LatencySummary::from_samples(TransactionType::PriceUpdate, vec![0.0, 0.0]);
        assert_eq!(zeros.count, 2);
        assert!(zeros.percentiles.is_empty());

        let some = LatencySummary::from_samples(TransactionType::PriceUpdate, vec![30.0, 10.0, 20.0]);
        assert!(close(some.average, 20.0));
        assert_eq!(some.percentiles.len(), 3);
        assert_eq!(some.percentiles[0].0, 50);
        assert!(close(some.percentiles[0].1, 20.0));
    }

    #[test]
    fn test_summarize_by_type_covers_every_executable_type() {
        let now = Utc::now();
        let latency = |tx_type, millis| Latency {
            tid: Tid::from("t"),
            tx_type,
            millis,
            completed_at: now,
        };
        let latencies = [
            latency(TransactionType::QueryDashboard, 4.0),
            latency(TransactionType::QueryDashboard, 6.0),
            latency(TransactionType::UpdateDelivery, 100.0),
        ];

        let summaries = summarize_by_type(&latencies);
        assert_eq!(summaries.len(), TransactionType::EXECUTABLE.len());
        assert_eq!(summaries[0].tx_type, TransactionType::CustomerSession);
        assert_eq!(summaries[0].count, 0);

        let dashboard = summaries
            .iter()
            .find(|s| s.tx_type == TransactionType::QueryDashboard)
            .unwrap();
        assert_eq!(dashboard.count, 2);
        assert!(close(dashboard.average, 5.0));
    }

    #[test]
    fn test_throughput() {
        assert_eq!(throughput(0, 10.0), 0.0);
        assert!(close(throughput(50, 10.0), 5.0));
    }
}
