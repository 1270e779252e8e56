//! Abort aggregation.

use indexmap::IndexMap;
use marketbench_types::{TransactionMark, TransactionType};
use std::collections::BTreeMap;
use tracing::info;

/// Order in which abort counts are reported.
const REPORT_ORDER: [TransactionType; 5] = [
    TransactionType::PriceUpdate,
    TransactionType::UpdateProduct,
    TransactionType::CustomerSession,
    TransactionType::QueryDashboard,
    TransactionType::UpdateDelivery,
];

/// Abort counts of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortSummary {
    /// Count per executable type, zero included.
    pub counts: IndexMap<TransactionType, usize>,
    /// `(seller id, count)`, ascending by count.
    pub seller_by_source: Vec<(u32, usize)>,
    /// `(customer id, count)`, ascending by count.
    pub customer_by_source: Vec<(u32, usize)>,
    /// Requests sent by aborted transactions, retries included.
    pub requests: usize,
}

impl AbortSummary {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Resubmissions made before giving up.
    pub fn retries(&self) -> usize {
        self.requests.saturating_sub(self.total())
    }
}

/// Aggregate the drained abort marks of the three ports.
///
/// Seller marks count under their own type; every customer mark counts as a
/// customer session and every delivery mark as a delivery update.
pub fn aggregate_aborts(
    seller: &[TransactionMark],
    customer: &[TransactionMark],
    delivery: &[TransactionMark],
) -> AbortSummary {
    let mut counts: IndexMap<TransactionType, usize> =
        REPORT_ORDER.iter().map(|t| (*t, 0)).collect();

    for mark in seller {
        *counts.entry(mark.tx_type).or_default() += 1;
    }
    *counts.entry(TransactionType::CustomerSession).or_default() += customer.len();
    *counts.entry(TransactionType::UpdateDelivery).or_default() += delivery.len();

    let requests = seller
        .iter()
        .chain(customer)
        .chain(delivery)
        .map(|mark| mark.attempts as usize)
        .sum();

    let seller_by_source = group_by_source(seller);
    if !seller_by_source.is_empty() {
        info!("Seller aborts by source");
        for (source, count) in &seller_by_source {
            info!(source, count, "Aborts");
        }
    }

    let customer_by_source = group_by_source(customer);
    if !customer_by_source.is_empty() {
        info!("Customer aborts by source");
        for (source, count) in &customer_by_source {
            info!(source, count, "Aborts");
        }
    }

    AbortSummary {
        counts,
        seller_by_source,
        customer_by_source,
        requests,
    }
}

fn group_by_source(marks: &[TransactionMark]) -> Vec<(u32, usize)> {
    let mut grouped: BTreeMap<u32, usize> = BTreeMap::new();
    for mark in marks {
        *grouped.entry(mark.source_id).or_default() += 1;
    }
    let mut grouped: Vec<_> = grouped.into_iter().collect();
    // Stable: ties keep ascending source order.
    grouped.sort_by_key(|(_, count)| *count);
    grouped
}
