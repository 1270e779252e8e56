//! Port traits, one per platform role.

use crate::error::PortError;
use chrono::{DateTime, Utc};
use marketbench_types::{
    CartHistory, CustomerId, ProductUpdateHistory, SellerId, Tid, TransactionIdentifier,
    TransactionMark, TransactionOutput, TransactionType,
};
use std::sync::Arc;

/// Seller-side endpoint: price updates, product updates, dashboard queries.
pub trait SellerPort: Send + Sync {
    /// Execute one seller transaction.
    ///
    /// Non-success responses are recorded as abort marks by the port itself;
    /// an `Err` is reserved for failures the port could not classify.
    fn run(&self, seller_id: SellerId, tid: &Tid, tx_type: TransactionType)
        -> Result<(), PortError>;

    fn drain_submitted(&self, seller_id: SellerId) -> Vec<TransactionIdentifier>;

    fn drain_finished(&self, seller_id: SellerId) -> Vec<TransactionOutput>;

    fn drain_aborted(&self) -> Vec<TransactionMark>;

    /// Every product update issued so far, per seller, in issuance order.
    fn tracked_product_updates(&self) -> ProductUpdateHistory;
}

/// Customer-side endpoint: cart sessions ending in a checkout.
pub trait CustomerPort: Send + Sync {
    fn run(&self, customer_id: CustomerId, tid: &Tid) -> Result<(), PortError>;

    fn drain_submitted(&self, customer_id: CustomerId) -> Vec<TransactionIdentifier>;

    fn drain_finished(&self, customer_id: CustomerId) -> Vec<TransactionOutput>;

    fn drain_aborted(&self) -> Vec<TransactionMark>;

    /// Cart snapshots of checkouts completed at or before `finish_time`.
    fn cart_history(&self, finish_time: DateTime<Utc>) -> CartHistory;
}

/// Delivery endpoint: shipment updates.
pub trait DeliveryPort: Send + Sync {
    fn run(&self, tid: &Tid) -> Result<(), PortError>;

    fn drain_submitted(&self) -> Vec<TransactionIdentifier>;

    fn drain_finished(&self) -> Vec<TransactionOutput>;

    fn drain_aborted(&self) -> Vec<TransactionMark>;
}

/// The three ports of one experiment, shared by scheduler and collector.
#[derive(Clone)]
pub struct ServicePorts {
    pub seller: Arc<dyn SellerPort>,
    pub customer: Arc<dyn CustomerPort>,
    pub delivery: Arc<dyn DeliveryPort>,
}

impl ServicePorts {
    pub fn new(
        seller: Arc<dyn SellerPort>,
        customer: Arc<dyn CustomerPort>,
        delivery: Arc<dyn DeliveryPort>,
    ) -> Self {
        Self {
            seller,
            customer,
            delivery,
        }
    }
}
