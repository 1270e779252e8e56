//! Inputs to the replication anomaly detector.

use crate::identifiers::{CustomerId, ProductId, SellerId, Tid};
use std::collections::BTreeMap;

/// One entry of a seller's product update history.
///
/// A price update keeps the version; a product update bumps it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductUpdate {
    pub product_id: ProductId,
    pub version: u32,
    pub price: f64,
}

impl ProductUpdate {
    pub fn new(product_id: ProductId, version: u32, price: f64) -> Self {
        Self {
            product_id,
            version,
            price,
        }
    }
}

/// A product as captured in a customer's cart at checkout time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartItem {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub version: u32,
    pub unit_price: f64,
}

impl CartItem {
    pub fn new(seller_id: SellerId, product_id: ProductId, version: u32, unit_price: f64) -> Self {
        Self {
            seller_id,
            product_id,
            version,
            unit_price,
        }
    }
}

/// Per-seller update history, in issuance order.
pub type ProductUpdateHistory = BTreeMap<SellerId, Vec<ProductUpdate>>;

/// Per-customer, per-checkout cart snapshots. Items keep their cart order.
pub type CartHistory = BTreeMap<CustomerId, BTreeMap<Tid, Vec<CartItem>>>;
