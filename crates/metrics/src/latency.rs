//! Joining submissions with completions into latency samples.

use chrono::{DateTime, Utc};
use indexmap::map::Entry;
use indexmap::IndexMap;
use marketbench_types::{Latency, Tid, TransactionIdentifier, TransactionOutput};
use tracing::warn;

/// Negative latencies smaller than this in magnitude are attributed to clock
/// skew between threads and taken as their absolute value.
pub const CLOCK_SKEW_TOLERANCE_MS: f64 = 100.0;

/// Submitted and finished records of one port role, deduplicated by tid.
///
/// The first record seen for a tid wins; later ones are counted and logged.
#[derive(Debug)]
pub struct TransactionLedger {
    role: &'static str,
    submitted: IndexMap<Tid, TransactionIdentifier>,
    finished: IndexMap<Tid, TransactionOutput>,
    duplicate_submitted: usize,
    duplicate_finished: usize,
}

impl TransactionLedger {
    /// `role` tags log lines (`seller`, `customer`, `delivery`).
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            submitted: IndexMap::new(),
            finished: IndexMap::new(),
            duplicate_submitted: 0,
            duplicate_finished: 0,
        }
    }

    pub fn add_submitted<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = TransactionIdentifier>,
    {
        for entry in entries {
            match self.submitted.entry(entry.tid.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(existing) => {
                    self.duplicate_submitted += 1;
                    warn!(
                        role = self.role,
                        existing = ?existing.get(),
                        new = ?entry,
                        "Duplicate submitted transaction entry"
                    );
                }
            }
        }
    }

    pub fn add_finished<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = TransactionOutput>,
    {
        for entry in entries {
            match self.finished.entry(entry.tid.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(existing) => {
                    self.duplicate_finished += 1;
                    warn!(
                        role = self.role,
                        existing = ?existing.get(),
                        new = ?entry,
                        "Duplicate finished transaction entry"
                    );
                }
            }
        }
    }

    /// Duplicate (submitted, finished) entries seen so far.
    pub fn duplicates(&self) -> (usize, usize) {
        (self.duplicate_submitted, self.duplicate_finished)
    }

    /// Join the ledger into latency samples for completions up to `finish`.
    pub fn build_latency_list(&self, finish: DateTime<Utc>) -> LatencyBuild {
        if self.duplicate_submitted > 0 || self.duplicate_finished > 0 {
            warn!(
                role = self.role,
                submitted = self.duplicate_submitted,
                finished = self.duplicate_finished,
                "Duplicated transaction entries found"
            );
        }
        build_latency_list(&self.submitted, self.finished.values(), finish, self.role)
    }
}

/// Latency samples of one role plus what had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyBuild {
    pub latencies: Vec<Latency>,
    /// Completions without a matching submission.
    pub orphans: usize,
    /// Negative latencies within tolerance, taken as absolute value.
    pub skew_corrected: usize,
    /// Negative latencies beyond tolerance.
    pub dropped: usize,
}

/// Turn completions at or before `finish` into latency samples.
pub fn build_latency_list<'a, I>(
    submitted: &IndexMap<Tid, TransactionIdentifier>,
    finished: I,
    finish: DateTime<Utc>,
    role: &str,
) -> LatencyBuild
where
    I: IntoIterator<Item = &'a TransactionOutput>,
{
    let mut build = LatencyBuild::default();

    for output in finished.into_iter().filter(|o| o.completed_at <= finish) {
        let Some(init) = submitted.get(&output.tid) else {
            build.orphans += 1;
            warn!(
                role,
                tid = %output.tid,
                "Cannot find submitted transaction for finished transaction"
            );
            continue;
        };

        let mut millis = elapsed_millis(init.submitted_at, output.completed_at);
        if millis < 0.0 {
            if millis > -CLOCK_SKEW_TOLERANCE_MS {
                millis = -millis;
                build.skew_corrected += 1;
            } else {
                build.dropped += 1;
                warn!(
                    role,
                    tid = %output.tid,
                    submitted_at = %init.submitted_at,
                    completed_at = %output.completed_at,
                    "Negative latency beyond clock skew tolerance"
                );
                continue;
            }
        }

        build.latencies.push(Latency {
            tid: output.tid.clone(),
            tx_type: init.tx_type,
            millis,
            completed_at: output.completed_at,
        });
    }

    build
}

/// `to - from` in fractional milliseconds.
pub(crate) fn elapsed_millis(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}
