//! Routes one transaction to the port that serves it.

use crate::customer_pool::IdleCustomerPool;
use crate::error::WorkloadError;
use marketbench_ports::{PortError, ServicePorts};
use marketbench_types::{IdSampler, SellerId, Tid, TransactionType};
use rand::Rng;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, trace, warn};

/// Executes transactions against the service ports.
///
/// Failures never propagate out of [`Dispatcher::run_transaction`]: port
/// errors and panics are logged with the tid and type and the run goes on.
pub struct Dispatcher {
    ports: ServicePorts,
    customers: IdleCustomerPool,
    seller_sampler: IdSampler,
}

impl Dispatcher {
    pub fn new(ports: ServicePorts, seller_sampler: IdSampler) -> Self {
        Self {
            ports,
            customers: IdleCustomerPool::new(),
            seller_sampler,
        }
    }

    pub fn customers(&self) -> &IdleCustomerPool {
        &self.customers
    }

    pub fn ports(&self) -> &ServicePorts {
        &self.ports
    }

    /// Execute one transaction, logging and swallowing any failure.
    pub fn run_transaction<R: Rng + ?Sized>(&self, tx_type: TransactionType, tid: &Tid, rng: &mut R) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.call_port(tx_type, tid, rng)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(WorkloadError::Port(err))) => log_port_failure(tx_type, tid, &err),
            Ok(Err(err)) => {
                error!(%tid, %tx_type, error = %err, "Transaction failed");
            }
            Err(payload) => {
                error!(
                    %tid,
                    %tx_type,
                    panic = panic_message(payload.as_ref()),
                    "Port panicked while running transaction"
                );
            }
        }
    }

    fn call_port<R: Rng + ?Sized>(
        &self,
        tx_type: TransactionType,
        tid: &Tid,
        rng: &mut R,
    ) -> Result<(), WorkloadError> {
        match tx_type {
            TransactionType::CustomerSession => {
                let customer = self.customers.acquire()?;
                self.ports.customer.run(customer.id(), tid)?;
            }
            TransactionType::PriceUpdate
            | TransactionType::UpdateProduct
            | TransactionType::QueryDashboard => {
                let seller = SellerId(self.seller_sampler.sample(rng));
                self.ports.seller.run(seller, tid, tx_type)?;
            }
            TransactionType::UpdateDelivery => {
                self.ports.delivery.run(tid)?;
            }
            TransactionType::None => {
                trace!(%tid, "Cutoff table not covering draw, nothing to run");
            }
        }
        Ok(())
    }
}

fn log_port_failure(tx_type: TransactionType, tid: &Tid, err: &PortError) {
    if err.is_transport() {
        error!(
            %tid,
            %tx_type,
            error = %err,
            root_cause = %err.root_cause(),
            "Transaction failed at transport level"
        );
    } else {
        warn!(%tid, %tx_type, error = %err, "Transaction failed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketbench_ports::{CustomerPort, DeliveryPort, FixedDelayDeliveryPort, SellerPort};
    use marketbench_types::{
        CartHistory, CustomerId, DistributionType, Interval, ProductUpdateHistory,
        TransactionIdentifier, TransactionMark, TransactionOutput,
    };
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingSeller {
        calls: Mutex<Vec<(SellerId, TransactionType)>>,
    }

    impl SellerPort for RecordingSeller {
        fn run(&self, seller_id: SellerId, _tid: &Tid, tx_type: TransactionType) -> Result<(), PortError> {
            self.calls.lock().push((seller_id, tx_type));
            Ok(())
        }
        fn drain_submitted(&self, _: SellerId) -> Vec<TransactionIdentifier> {
            Vec::new()
        }
        fn drain_finished(&self, _: SellerId) -> Vec<TransactionOutput> {
            Vec::new()
        }
        fn drain_aborted(&self) -> Vec<TransactionMark> {
            Vec::new()
        }
        fn tracked_product_updates(&self) -> ProductUpdateHistory {
            ProductUpdateHistory::new()
        }
    }

    /// Fails every session: by transport error for odd customers, by panic
    /// for even ones.
    #[derive(Default)]
    struct FaultyCustomer;

    impl CustomerPort for FaultyCustomer {
        fn run(&self, customer_id: CustomerId, _tid: &Tid) -> Result<(), PortError> {
            if customer_id.0 % 2 == 1 {
                Err(PortError::transport(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )))
            } else {
                panic!("customer port exploded");
            }
        }
        fn drain_submitted(&self, _: CustomerId) -> Vec<TransactionIdentifier> {
            Vec::new()
        }
        fn drain_finished(&self, _: CustomerId) -> Vec<TransactionOutput> {
            Vec::new()
        }
        fn drain_aborted(&self) -> Vec<TransactionMark> {
            Vec::new()
        }
        fn cart_history(&self, _: DateTime<Utc>) -> CartHistory {
            CartHistory::new()
        }
    }

    fn dispatcher(seller: Arc<RecordingSeller>) -> Dispatcher {
        let delivery: Arc<dyn DeliveryPort> = Arc::new(FixedDelayDeliveryPort::new(Duration::ZERO));
        let ports = ServicePorts::new(seller, Arc::new(FaultyCustomer), delivery);
        let sampler = IdSampler::new(Interval::new(3, 5), DistributionType::Uniform).unwrap();
        Dispatcher::new(ports, sampler)
    }

    #[test]
    fn test_seller_types_sample_seller_in_range() {
        let seller = Arc::new(RecordingSeller::default());
        let dispatcher = dispatcher(Arc::clone(&seller));
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for (seq, tx_type) in [
            TransactionType::PriceUpdate,
            TransactionType::UpdateProduct,
            TransactionType::QueryDashboard,
        ]
        .into_iter()
        .enumerate()
        {
            dispatcher.run_transaction(tx_type, &Tid::for_worker(0, seq as u64), &mut rng);
        }

        let calls = seller.calls.lock();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(id, _)| (3..=5).contains(&id.0)));
        assert_eq!(calls[2].1, TransactionType::QueryDashboard);
    }

    #[traced_test]
    #[test]
    fn test_failures_are_logged_and_lease_returned() {
        let dispatcher = dispatcher(Arc::new(RecordingSeller::default()));
        dispatcher.customers().repopulate(Interval::new(1, 2));
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        dispatcher.run_transaction(TransactionType::CustomerSession, &Tid::from("0-1"), &mut rng);
        dispatcher.run_transaction(TransactionType::CustomerSession, &Tid::from("0-2"), &mut rng);

        assert_eq!(dispatcher.customers().idle(), 2);
        assert!(logs_contain("connection reset by peer"));
        assert!(logs_contain("customer port exploded"));
    }

    #[test]
    fn test_none_and_delivery_do_not_touch_sellers() {
        let seller = Arc::new(RecordingSeller::default());
        let dispatcher = dispatcher(Arc::clone(&seller));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        dispatcher.run_transaction(TransactionType::None, &Tid::from("0-1"), &mut rng);
        dispatcher.run_transaction(TransactionType::UpdateDelivery, &Tid::from("0-2"), &mut rng);

        assert!(seller.calls.lock().is_empty());
        assert_eq!(dispatcher.ports().delivery.drain_finished().len(), 1);
    }
}
