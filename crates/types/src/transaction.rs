//! Transaction records produced by the service ports and consumed by the
//! metric collector.

use crate::identifiers::Tid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of transaction the scheduler can issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    CustomerSession,
    PriceUpdate,
    UpdateProduct,
    QueryDashboard,
    UpdateDelivery,
    /// Produced when the cutoff table does not cover the drawn value.
    None,
}

impl TransactionType {
    /// Every transaction type, in declaration order.
    pub const ALL: [TransactionType; 6] = [
        TransactionType::CustomerSession,
        TransactionType::PriceUpdate,
        TransactionType::UpdateProduct,
        TransactionType::QueryDashboard,
        TransactionType::UpdateDelivery,
        TransactionType::None,
    ];

    /// Transaction types that can actually be executed against a port.
    pub const EXECUTABLE: [TransactionType; 5] = [
        TransactionType::CustomerSession,
        TransactionType::PriceUpdate,
        TransactionType::UpdateProduct,
        TransactionType::QueryDashboard,
        TransactionType::UpdateDelivery,
    ];

    /// Whether this transaction is served by the seller port.
    pub fn is_seller_transaction(self) -> bool {
        matches!(
            self,
            TransactionType::PriceUpdate
                | TransactionType::UpdateProduct
                | TransactionType::QueryDashboard
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::CustomerSession => "CUSTOMER_SESSION",
            TransactionType::PriceUpdate => "PRICE_UPDATE",
            TransactionType::UpdateProduct => "UPDATE_PRODUCT",
            TransactionType::QueryDashboard => "QUERY_DASHBOARD",
            TransactionType::UpdateDelivery => "UPDATE_DELIVERY",
            TransactionType::None => "NONE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted transaction. Created at submission time and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionIdentifier {
    pub tid: Tid,
    pub tx_type: TransactionType,
    pub submitted_at: DateTime<Utc>,
}

impl TransactionIdentifier {
    pub fn new(tid: Tid, tx_type: TransactionType, submitted_at: DateTime<Utc>) -> Self {
        Self {
            tid,
            tx_type,
            submitted_at,
        }
    }
}

/// Completion of a transaction as observed by a port.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutput {
    pub tid: Tid,
    pub completed_at: DateTime<Utc>,
}

impl TransactionOutput {
    pub fn new(tid: Tid, completed_at: DateTime<Utc>) -> Self {
        Self { tid, completed_at }
    }
}

/// Status carried by a transaction mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkStatus {
    Abort,
}

/// A failed transaction, tagged with the component that rejected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMark {
    pub tid: Tid,
    pub tx_type: TransactionType,
    /// Seller or customer id that issued the transaction (1 for delivery).
    pub source_id: u32,
    pub status: MarkStatus,
    pub component: String,
    /// Requests sent before the transaction was given up.
    pub attempts: u32,
}

impl TransactionMark {
    /// Create an abort mark.
    pub fn abort(
        tid: Tid,
        tx_type: TransactionType,
        source_id: u32,
        component: impl Into<String>,
    ) -> Self {
        Self {
            tid,
            tx_type,
            source_id,
            status: MarkStatus::Abort,
            component: component.into(),
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// End-to-end latency of one completed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Latency {
    pub tid: Tid,
    pub tx_type: TransactionType,
    pub millis: f64,
    pub completed_at: DateTime<Utc>,
}
