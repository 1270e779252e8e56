//! How a port learns that a transaction finished.

use crate::signal::CompletionSignal;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Sender};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type RecordFn = Box<dyn FnOnce(DateTime<Utc>) + Send + 'static>;

struct PendingCompletion {
    due: Instant,
    record: RecordFn,
}

/// Delivers completions on a background thread after a fixed delay.
///
/// Models platforms that acknowledge a request immediately and report the
/// outcome later through an event stream. Each delivered completion is
/// recorded through its callback and then announced on the shared
/// [`CompletionSignal`].
pub struct CompletionPump {
    tx: Sender<PendingCompletion>,
    in_flight: Arc<AtomicUsize>,
    delay: Duration,
    signal: CompletionSignal,
}

impl std::fmt::Debug for CompletionPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionPump")
            .field("delay", &self.delay)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl CompletionPump {
    /// Start the pump thread. It exits once the pump is dropped and the
    /// queue is empty.
    pub fn spawn(delay: Duration, signal: CompletionSignal) -> io::Result<Self> {
        let (tx, rx) = channel::unbounded::<PendingCompletion>();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker_in_flight = Arc::clone(&in_flight);
        let worker_signal = signal.clone();
        thread::Builder::new()
            .name("completion-pump".into())
            .spawn(move || {
                for pending in rx.iter() {
                    let now = Instant::now();
                    if pending.due > now {
                        thread::sleep(pending.due - now);
                    }
                    (pending.record)(Utc::now());
                    worker_signal.notify();
                    worker_in_flight.fetch_sub(1, Ordering::AcqRel);
                }
                debug!("Completion pump stopped");
            })?;

        Ok(Self {
            tx,
            in_flight,
            delay,
            signal,
        })
    }

    /// Completions accepted but not delivered yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until every accepted completion was delivered.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn quiesce(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn schedule(&self, record: RecordFn) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let pending = PendingCompletion {
            due: Instant::now() + self.delay,
            record,
        };
        if self.tx.send(pending).is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            warn!("Completion pump is gone, dropping completion");
        }
    }
}

/// Completion mode of a simulated port.
#[derive(Debug, Clone, Default)]
pub enum Completion {
    /// Finished when the call returns.
    #[default]
    Synchronous,
    /// Finished when the pump delivers it.
    Asynchronous(Arc<CompletionPump>),
}

impl Completion {
    /// Record a successful transaction according to the mode.
    pub fn finish<F>(&self, record: F)
    where
        F: FnOnce(DateTime<Utc>) + Send + 'static,
    {
        match self {
            Completion::Synchronous => record(Utc::now()),
            Completion::Asynchronous(pump) => pump.schedule(Box::new(record)),
        }
    }

    /// Record a transaction that completes inline even on an asynchronous
    /// platform, and announce it.
    pub fn finish_now<F>(&self, record: F)
    where
        F: FnOnce(DateTime<Utc>),
    {
        record(Utc::now());
        if let Completion::Asynchronous(pump) = self {
            pump.signal.notify();
        }
    }

    /// A transaction ended without output. Announce it so the closed loop
    /// does not wait on it.
    pub fn release(&self) {
        if let Completion::Asynchronous(pump) = self {
            pump.signal.notify();
        }
    }
}
