use super::{settle_failure, Completion, SimulatedPlatform};
use crate::error::PortError;
use crate::log::TransactionLog;
use crate::traits::CustomerPort;
use chrono::{DateTime, Utc};
use marketbench_types::{
    CartHistory, CartItem, CustomerId, Tid, TransactionIdentifier, TransactionMark,
    TransactionOutput, TransactionType,
};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Customer port backed by the simulated platform.
///
/// A session fills a cart with distinct products read from the replica and,
/// with the configured checkout probability, checks it out. Abandoned
/// sessions leave no record. A rejected checkout is resubmitted up to
/// `max_checkout_attempts` times before it counts as aborted.
#[derive(Debug)]
pub struct SimCustomerPort {
    platform: Arc<SimulatedPlatform>,
    log: Arc<TransactionLog<CustomerId>>,
    completion: Completion,
}

impl SimCustomerPort {
    pub fn new(platform: Arc<SimulatedPlatform>, completion: Completion) -> Self {
        Self {
            platform,
            log: Arc::new(TransactionLog::new()),
            completion,
        }
    }
}

impl SimCustomerPort {
    /// Read distinct `(seller, product)` items from the replica.
    fn fill_cart<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<CartItem>, PortError> {
        let config = self.platform.config();
        let mut wanted =
            rng.gen_range(config.items_per_cart.min..=config.items_per_cart.max) as usize;
        let single_seller = if config.unique_seller {
            wanted = wanted.min(config.products_per_seller as usize);
            Some(self.platform.sample_seller(rng))
        } else {
            None
        };

        let mut seen = HashSet::with_capacity(wanted);
        let mut items = Vec::with_capacity(wanted);
        // Skewed key distributions repeat keys often; give up after a bounded
        // number of draws rather than spin.
        for _ in 0..wanted * 4 {
            if items.len() == wanted {
                break;
            }
            let seller = single_seller.unwrap_or_else(|| self.platform.sample_seller(rng));
            let product = self.platform.sample_product(rng);
            if seen.insert((seller, product)) {
                items.push(self.platform.read_product(seller, product, rng)?);
            }
        }
        Ok(items)
    }
}

impl CustomerPort for SimCustomerPort {
    fn run(&self, customer_id: CustomerId, tid: &Tid) -> Result<(), PortError> {
        let mut rng = rand::thread_rng();
        let items = match self
            .platform
            .ensure_customer(customer_id)
            .and_then(|()| self.fill_cart(&mut rng))
        {
            Ok(items) => items,
            Err(e) => {
                self.completion.release();
                return Err(e);
            }
        };

        let config = self.platform.config();
        if config.checkout_probability < 100
            && rng.gen_range(0..=100) > config.checkout_probability
        {
            trace!(%tid, customer = %customer_id, "Cart abandoned");
            self.completion.release();
            return Ok(());
        }

        // Rejected checkouts are resubmitted with the same cart. Latency is
        // measured from the attempt that went through.
        let mut attempt = 1;
        let outcome = loop {
            let sent_at = Utc::now();
            match self.platform.checkout(customer_id, tid, items.clone()) {
                Ok(_) => break Ok(sent_at),
                Err(PortError::Rejected { .. }) if attempt < config.max_checkout_attempts => {
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };
        if attempt > 1 {
            debug!(%tid, customer = %customer_id, attempts = attempt, "Checkout retried");
        }

        match outcome {
            Ok(sent_at) => {
                self.log.record_submitted(
                    customer_id,
                    TransactionIdentifier::new(
                        tid.clone(),
                        TransactionType::CustomerSession,
                        sent_at,
                    ),
                );
                let log = Arc::clone(&self.log);
                let tid = tid.clone();
                self.completion.finish(move |at| {
                    log.record_finished(customer_id, TransactionOutput::new(tid, at))
                });
                Ok(())
            }
            Err(e) => settle_failure(
                &self.log,
                &self.completion,
                TransactionMark::abort(
                    tid.clone(),
                    TransactionType::CustomerSession,
                    customer_id.0,
                    "cart",
                )
                .with_attempts(attempt),
                e,
            ),
        }
    }

    fn drain_submitted(&self, customer_id: CustomerId) -> Vec<TransactionIdentifier> {
        self.log.drain_submitted(&customer_id)
    }

    fn drain_finished(&self, customer_id: CustomerId) -> Vec<TransactionOutput> {
        self.log.drain_finished(&customer_id)
    }

    fn drain_aborted(&self) -> Vec<TransactionMark> {
        self.log.drain_aborted()
    }

    fn cart_history(&self, finish_time: DateTime<Utc>) -> CartHistory {
        self.platform.cart_history(finish_time)
    }
}
