//! Drainable transaction records kept by a port.

use dashmap::DashMap;
use marketbench_types::{TransactionIdentifier, TransactionMark, TransactionOutput};
use parking_lot::Mutex;
use std::hash::Hash;

/// Submitted / finished / aborted records of one port, keyed by the id of the
/// entity that issued them (seller id, customer id, or `()` for delivery).
///
/// Records may be appended concurrently from scheduler threads and from a
/// completion pump. Every `drain_*` call removes what it returns.
#[derive(Debug)]
pub struct TransactionLog<K: Eq + Hash> {
    submitted: DashMap<K, Vec<TransactionIdentifier>>,
    finished: DashMap<K, Vec<TransactionOutput>>,
    aborted: Mutex<Vec<TransactionMark>>,
}

impl<K: Eq + Hash> Default for TransactionLog<K> {
    fn default() -> Self {
        Self {
            submitted: DashMap::new(),
            finished: DashMap::new(),
            aborted: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Eq + Hash> TransactionLog<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self, key: K, entry: TransactionIdentifier) {
        self.submitted.entry(key).or_default().push(entry);
    }

    pub fn record_finished(&self, key: K, entry: TransactionOutput) {
        self.finished.entry(key).or_default().push(entry);
    }

    pub fn record_abort(&self, mark: TransactionMark) {
        self.aborted.lock().push(mark);
    }

    /// Remove and return the submissions recorded for `key`.
    pub fn drain_submitted(&self, key: &K) -> Vec<TransactionIdentifier> {
        self.submitted
            .remove(key)
            .map(|(_, entries)| entries)
            .unwrap_or_default()
    }

    /// Remove and return the completions recorded for `key`.
    pub fn drain_finished(&self, key: &K) -> Vec<TransactionOutput> {
        self.finished
            .remove(key)
            .map(|(_, entries)| entries)
            .unwrap_or_default()
    }

    /// Remove and return every abort mark.
    pub fn drain_aborted(&self) -> Vec<TransactionMark> {
        std::mem::take(&mut *self.aborted.lock())
    }

    /// Number of submissions not yet drained, across all keys.
    pub fn pending_submitted(&self) -> usize {
        self.submitted.iter().map(|entry| entry.value().len()).sum()
    }
}
