//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier.
///
/// Correlates a submission with its eventual completion or abort. Unique per
/// submission within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tid(pub String);

impl Tid {
    /// Build a tid from a worker slot and that worker's local sequence number.
    pub fn for_worker(worker: usize, seq: u64) -> Self {
        Tid(format!("{worker}-{seq}"))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Tid {
    fn from(value: String) -> Self {
        Tid(value)
    }
}

impl From<&str> for Tid {
    fn from(value: &str) -> Self {
        Tid(value.to_owned())
    }
}

impl From<u64> for Tid {
    fn from(value: u64) -> Self {
        Tid(value.to_string())
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seller identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SellerId(pub u32);

impl fmt::Display for SellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seller({})", self.0)
    }
}

/// Customer identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CustomerId(pub u32);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Customer({})", self.0)
    }
}

/// Product identifier, scoped to a seller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProductId(pub u32);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Product({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_tid_is_unique_per_slot_and_sequence() {
        assert_eq!(Tid::for_worker(3, 17).as_str(), "3-17");
        assert_ne!(Tid::for_worker(1, 12), Tid::for_worker(11, 2));
    }
}
