//! Completion signal shared between the closed-loop scheduler and the
//! ports' completion path.

use crossbeam::channel::{self, Receiver, Sender};

/// Queue of completion notifications.
///
/// Each notification admits one more transaction in closed-loop mode. The
/// signal is passed explicitly to whoever observes completions; cloning yields
/// another handle to the same queue.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Announce one completed transaction.
    pub fn notify(&self) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(());
    }

    /// Consume one notification if any is queued. Never blocks.
    pub fn try_consume(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Number of queued notifications.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Discard queued notifications left over from a previous run.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}
