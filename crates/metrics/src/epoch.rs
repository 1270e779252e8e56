//! Breakdown of a run into fixed-width epochs by completion time.

use crate::latency::elapsed_millis;
use crate::stats::{summarize_by_type, LatencySummary};
use chrono::{DateTime, Utc};
use marketbench_types::Latency;
use tracing::warn;

/// Statistics of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochBlock {
    /// One-based position of the epoch in the run.
    pub index: usize,
    pub summaries: Vec<LatencySummary>,
    pub completed: usize,
    /// `completed / epoch seconds`.
    pub throughput: f64,
}

/// Epochs of a run, in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochBreakdown {
    pub epoch_ms: u64,
    pub blocks: Vec<EpochBlock>,
}

/// Split `latencies` into epochs of `epoch_ms` by completion time.
///
/// Returns `None` unless `0 < epoch_ms < elapsed ms`. Samples completing
/// after `finish` or before `start` are left out; samples in the trailing
/// partial epoch land in the last bucket.
pub fn breakdown(
    latencies: &[Latency],
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
    epoch_ms: u64,
) -> Option<EpochBreakdown> {
    let elapsed_ms = elapsed_millis(start, finish);
    if epoch_ms == 0 || epoch_ms as f64 >= elapsed_ms {
        warn!(
            epoch_ms,
            elapsed_ms, "Skipping epoch breakdown, epoch outside allowed range"
        );
        return None;
    }

    let num_epochs = (elapsed_ms as u64 / epoch_ms) as usize;
    let mut buckets: Vec<Vec<&Latency>> = vec![Vec::new(); num_epochs];

    for latency in latencies {
        if latency.completed_at > finish {
            continue;
        }
        let offset = elapsed_millis(start, latency.completed_at);
        if offset < 0.0 {
            continue;
        }
        let idx = ((offset / epoch_ms as f64).floor() as usize).min(num_epochs - 1);
        buckets[idx].push(latency);
    }

    let epoch_seconds = epoch_ms as f64 / 1000.0;
    let blocks = buckets
        .into_iter()
        .enumerate()
        .map(|(i, bucket)| EpochBlock {
            index: i + 1,
            completed: bucket.len(),
            throughput: bucket.len() as f64 / epoch_seconds,
            summaries: summarize_by_type(bucket),
        })
        .collect();

    Some(EpochBreakdown { epoch_ms, blocks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use marketbench_types::{Tid, TransactionType};

    fn completed_at(start: DateTime<Utc>, ms: i64) -> Latency {
        Latency {
            tid: Tid::from(ms as u64),
            tx_type: TransactionType::UpdateDelivery,
            millis: 5.0,
            completed_at: start + TimeDelta::milliseconds(ms),
        }
    }

    #[test]
    fn test_samples_bucketed_by_completion() {
        let start = Utc::now();
        let finish = start + TimeDelta::milliseconds(10_000);
        let latencies = [
            completed_at(start, 500),
            completed_at(start, 2_500),
            completed_at(start, 3_100),
            completed_at(start, 9_999),
            completed_at(start, 10_500),
        ];

        let breakdown = breakdown(&latencies, start, finish, 3_000).unwrap();

        assert_eq!(breakdown.blocks.len(), 3);
        let counts: Vec<_> = breakdown.blocks.iter().map(|b| b.completed).collect();
        // 9 999 ms clamps into the last bucket; 10 500 ms is past finish.
        assert_eq!(counts, vec![2, 1, 1]);
        assert_eq!(breakdown.blocks[0].index, 1);
        assert!((breakdown.blocks[0].throughput - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(counts.iter().sum::<usize>(), 4);
    }

    #[test]
    fn test_ten_second_run_in_two_second_epochs() {
        let start = Utc::now();
        let finish = start + TimeDelta::milliseconds(10_000);
        let latencies = [
            completed_at(start, -1),
            completed_at(start, 0),
            completed_at(start, 1_999),
            completed_at(start, 2_000),
            completed_at(start, 9_999),
            completed_at(start, 10_000),
            completed_at(start, 10_001),
        ];

        let breakdown = breakdown(&latencies, start, finish, 2_000).unwrap();

        assert_eq!(breakdown.blocks.len(), 5);
        let counts: Vec<_> = breakdown.blocks.iter().map(|b| b.completed).collect();
        // A sample exactly at finish clamps into the last epoch.
        assert_eq!(counts, vec![2, 1, 0, 0, 2]);
        assert_eq!(breakdown.blocks[4].index, 5);
        assert!((breakdown.blocks[4].throughput - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_epoch_outside_range_disables_breakdown() {
        let start = Utc::now();
        let finish = start + TimeDelta::milliseconds(1_000);
        assert!(breakdown(&[], start, finish, 0).is_none());
        assert!(breakdown(&[], start, finish, 1_000).is_none());
        assert!(breakdown(&[], start, finish, 5_000).is_none());
        assert_eq!(breakdown(&[], start, finish, 250).unwrap().blocks.len(), 4);
    }

    #[test]
    fn test_samples_before_start_excluded() {
        let start = Utc::now();
        let finish = start + TimeDelta::milliseconds(1_000);
        let latencies = [completed_at(start, -10), completed_at(start, 10)];

        let breakdown = breakdown(&latencies, start, finish, 500).unwrap();
        assert_eq!(breakdown.blocks[0].completed, 1);
    }
}
