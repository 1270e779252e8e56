//! Pool of customers that currently have no session running.

use crate::error::WorkloadError;
use crossbeam::channel::{self, Receiver, Sender};
use marketbench_types::{CustomerId, Interval};
use std::ops::Deref;

/// Multi-producer multi-consumer queue of idle customer ids.
///
/// A customer id is either in the pool or held by exactly one
/// [`CustomerLease`], so no customer ever runs two sessions at once.
#[derive(Debug)]
pub struct IdleCustomerPool {
    tx: Sender<CustomerId>,
    rx: Receiver<CustomerId>,
}

impl Default for IdleCustomerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleCustomerPool {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Drop every queued id and enqueue each id of `range`.
    pub fn repopulate(&self, range: Interval) {
        while self.rx.try_recv().is_ok() {}
        for id in range.iter() {
            self.release(CustomerId(id));
        }
    }

    /// Take an idle customer, blocking until one is available.
    pub fn acquire(&self) -> Result<CustomerLease<'_>, WorkloadError> {
        let id = self.rx.recv().map_err(|_| WorkloadError::PoolClosed)?;
        Ok(CustomerLease { id, pool: self })
    }

    /// Take an idle customer if one is queued.
    pub fn try_acquire(&self) -> Option<CustomerLease<'_>> {
        self.rx
            .try_recv()
            .ok()
            .map(|id| CustomerLease { id, pool: self })
    }

    /// Number of idle customers.
    pub fn idle(&self) -> usize {
        self.rx.len()
    }

    fn release(&self, id: CustomerId) {
        // The pool owns both ends; the send cannot fail.
        let _ = self.tx.send(id);
    }
}

/// Exclusive use of one customer id. The id returns to the pool on drop.
#[derive(Debug)]
pub struct CustomerLease<'a> {
    id: CustomerId,
    pool: &'a IdleCustomerPool,
}

impl CustomerLease<'_> {
    pub fn id(&self) -> CustomerId {
        self.id
    }
}

impl Deref for CustomerLease<'_> {
    type Target = CustomerId;

    fn deref(&self) -> &CustomerId {
        &self.id
    }
}

impl Drop for CustomerLease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_repopulate_replaces_contents() {
        let pool = IdleCustomerPool::new();
        pool.repopulate(Interval::new(1, 5));
        assert_eq!(pool.idle(), 5);

        pool.repopulate(Interval::new(10, 11));
        assert_eq!(pool.idle(), 2);
        let lease = pool.try_acquire().unwrap();
        assert_eq!(lease.id(), CustomerId(10));
    }

    #[test]
    fn test_lease_returns_id_on_drop() {
        let pool = IdleCustomerPool::new();
        pool.repopulate(Interval::new(1, 1));

        {
            let lease = pool.acquire().unwrap();
            assert_eq!(*lease, CustomerId(1));
            assert!(pool.try_acquire().is_none());
        }
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_customers_never_leased_twice_concurrently() {
        let pool = Arc::new(IdleCustomerPool::new());
        pool.repopulate(Interval::new(1, 4));
        let active = Arc::new(Mutex::new(HashSet::new()));
        let violations = Arc::new(Mutex::new(0usize));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let active = Arc::clone(&active);
                let violations = Arc::clone(&violations);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let lease = pool.acquire().unwrap();
                        if !active.lock().insert(lease.id()) {
                            *violations.lock() += 1;
                        }
                        thread::yield_now();
                        active.lock().remove(&lease.id());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*violations.lock(), 0);
        assert_eq!(pool.idle(), 4);
    }
}
