//! Concurrency disciplines of a run.
//!
//! - [`OpenLoop`]: a fixed set of worker threads submitting back to back
//! - [`ClosedLoop`]: one driver keeping a bounded number of transactions in
//!   flight, admitting a new one per completion signal

mod closed;
mod open;

pub use closed::{ClosedLoop, SignalPolicy};
pub use open::OpenLoop;

use crate::dispatch::Dispatcher;
use crate::error::WorkloadError;
use crate::mix::TransactionMix;
use chrono::{DateTime, Utc};
use marketbench_types::TransactionType;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A way of driving transactions for a fixed wall-clock window.
pub trait RunStrategy: Send + Sync {
    fn run(
        &self,
        dispatcher: Arc<Dispatcher>,
        mix: Arc<TransactionMix>,
    ) -> Result<RunWindow, WorkloadError>;
}

/// Outcome of one run as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct RunWindow {
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    /// Transactions handed to the dispatcher.
    pub submitted: u64,
    /// Last tid issued, for the run log.
    pub last_tid: Option<String>,
    pub histogram: TypeHistogram,
}

/// Number of transactions submitted per type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeHistogram(BTreeMap<TransactionType, u64>);

impl TypeHistogram {
    pub fn record(&mut self, tx_type: TransactionType) {
        *self.0.entry(tx_type).or_default() += 1;
    }

    pub fn merge(&mut self, other: &TypeHistogram) {
        for (tx_type, count) in &other.0 {
            *self.0.entry(*tx_type).or_default() += count;
        }
    }

    pub fn get(&self, tx_type: TransactionType) -> u64 {
        self.0.get(&tx_type).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TransactionType, u64)> + '_ {
        self.0.iter().map(|(t, c)| (*t, *c))
    }
}

/// Cooperative stop flag shared by the controller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sleep until `deadline` or until `cancel` is raised, whichever comes first.
fn sleep_until(deadline: Instant, cancel: &CancellationFlag) {
    const SLICE: Duration = Duration::from_millis(10);
    loop {
        let now = Instant::now();
        if now >= deadline || cancel.is_cancelled() {
            return;
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}
