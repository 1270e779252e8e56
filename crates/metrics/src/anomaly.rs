//! Replication anomaly detector.
//!
//! A cart shows a causality anomaly when it contains a product state that was
//! issued after some update to another product of the same seller, yet shows
//! the other product at a price that update had already replaced.
//!
//! For every cart and every seller with at least two items in it, each item
//! after the first is a pivot. The pivot is located in the seller's update
//! history by exact `(product, version, price)` match. Every earlier item of
//! the group is then looked up in the history after the pivot: an entry with
//! the same product and version but a different price is an anomaly; an entry
//! with the same price ends the scan for that item.

use marketbench_types::{
    CartHistory, CartItem, CustomerId, ProductUpdate, ProductUpdateHistory, SellerId, Tid,
};
use std::collections::{BTreeMap, BTreeSet};

/// One anomalous cart item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationAnomaly {
    pub customer_id: CustomerId,
    pub tid: Tid,
    pub seller_id: SellerId,
    /// Position of the stale item within the seller's group of the cart.
    pub item_position: usize,
    /// Index of the update the item missed in the seller's history.
    pub update_position: usize,
}

/// Every anomaly found in `carts` against `updates`.
pub fn detect_replication_anomalies(
    updates: &ProductUpdateHistory,
    carts: &CartHistory,
) -> Vec<ReplicationAnomaly> {
    let mut anomalies = Vec::new();

    for (customer_id, checkouts) in carts {
        for (tid, items) in checkouts {
            for (seller_id, group) in group_by_seller(items) {
                if group.len() < 2 {
                    continue;
                }
                let Some(history) = updates.get(&seller_id) else {
                    continue;
                };

                for (item_position, update_position) in scan_group(&group, history) {
                    anomalies.push(ReplicationAnomaly {
                        customer_id: *customer_id,
                        tid: tid.clone(),
                        seller_id,
                        item_position,
                        update_position,
                    });
                }
            }
        }
    }

    anomalies
}

/// Number of anomalies found in `carts` against `updates`.
pub fn count_replication_anomalies(updates: &ProductUpdateHistory, carts: &CartHistory) -> usize {
    detect_replication_anomalies(updates, carts).len()
}

fn group_by_seller(items: &[CartItem]) -> BTreeMap<SellerId, Vec<&CartItem>> {
    let mut groups: BTreeMap<SellerId, Vec<&CartItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.seller_id).or_default().push(item);
    }
    groups
}

/// `(item position, update position)` pairs flagged in one seller group.
fn scan_group(group: &[&CartItem], history: &[ProductUpdate]) -> BTreeSet<(usize, usize)> {
    let mut flagged = BTreeSet::new();

    for (i, pivot) in group.iter().enumerate().skip(1) {
        let Some(pivot_pos) = history.iter().position(|u| {
            u.product_id == pivot.product_id
                && u.version == pivot.version
                && u.price == pivot.unit_price
        }) else {
            continue;
        };

        for (j, earlier) in group.iter().enumerate().take(i) {
            for (pos, update) in history.iter().enumerate().skip(pivot_pos + 1) {
                if update.product_id != earlier.product_id || update.version != earlier.version {
                    continue;
                }
                if update.price != earlier.unit_price {
                    flagged.insert((j, pos));
                } else {
                    break;
                }
            }
        }
    }

    flagged
}
