use super::{settle_failure, Completion, SimulatedPlatform};
use crate::error::PortError;
use crate::log::TransactionLog;
use crate::traits::SellerPort;
use chrono::Utc;
use marketbench_types::{
    ProductUpdateHistory, SellerId, Tid, TransactionIdentifier, TransactionMark,
    TransactionOutput, TransactionType,
};
use std::sync::Arc;

/// Seller port backed by the simulated platform.
///
/// Dashboard queries always complete inline; price and product updates
/// follow the configured [`Completion`] mode.
#[derive(Debug)]
pub struct SimSellerPort {
    platform: Arc<SimulatedPlatform>,
    log: Arc<TransactionLog<SellerId>>,
    completion: Completion,
}

impl SimSellerPort {
    pub fn new(platform: Arc<SimulatedPlatform>, completion: Completion) -> Self {
        Self {
            platform,
            log: Arc::new(TransactionLog::new()),
            completion,
        }
    }

    fn submit(&self, seller_id: SellerId, tid: &Tid, tx_type: TransactionType) {
        self.log.record_submitted(
            seller_id,
            TransactionIdentifier::new(tid.clone(), tx_type, Utc::now()),
        );
    }
}

impl SellerPort for SimSellerPort {
    fn run(
        &self,
        seller_id: SellerId,
        tid: &Tid,
        tx_type: TransactionType,
    ) -> Result<(), PortError> {
        let (component, outcome) = match tx_type {
            TransactionType::PriceUpdate => {
                self.submit(seller_id, tid, tx_type);
                ("product", self.platform.update_price(seller_id).map(drop))
            }
            TransactionType::UpdateProduct => {
                self.submit(seller_id, tid, tx_type);
                ("product", self.platform.update_product(seller_id).map(drop))
            }
            TransactionType::QueryDashboard => {
                self.submit(seller_id, tid, tx_type);
                return match self.platform.dashboard(seller_id) {
                    Ok(_) => {
                        self.completion.finish_now(|at| {
                            self.log
                                .record_finished(seller_id, TransactionOutput::new(tid.clone(), at))
                        });
                        Ok(())
                    }
                    Err(e) => settle_failure(
                        &self.log,
                        &self.completion,
                        TransactionMark::abort(tid.clone(), tx_type, seller_id.0, "seller"),
                        e,
                    ),
                };
            }
            other => {
                self.completion.release();
                return Err(PortError::Unsupported(other));
            }
        };

        match outcome {
            Ok(()) => {
                let log = Arc::clone(&self.log);
                let tid = tid.clone();
                self.completion.finish(move |at| {
                    log.record_finished(seller_id, TransactionOutput::new(tid, at))
                });
                Ok(())
            }
            Err(e) => settle_failure(
                &self.log,
                &self.completion,
                TransactionMark::abort(tid.clone(), tx_type, seller_id.0, component),
                e,
            ),
        }
    }

    fn drain_submitted(&self, seller_id: SellerId) -> Vec<TransactionIdentifier> {
        self.log.drain_submitted(&seller_id)
    }

    fn drain_finished(&self, seller_id: SellerId) -> Vec<TransactionOutput> {
        self.log.drain_finished(&seller_id)
    }

    fn drain_aborted(&self) -> Vec<TransactionMark> {
        self.log.drain_aborted()
    }

    fn tracked_product_updates(&self) -> ProductUpdateHistory {
        self.platform.product_updates()
    }
}
