//! Core types for the marketplace benchmark driver.
//!
//! These types are shared by the scheduler, the service ports and the metric
//! collector:
//!
//! - **Identifiers**: `Tid`, `SellerId`, `CustomerId`, `ProductId`
//! - **Transaction records**: submissions, completions, abort marks, latencies
//! - **Workload parameters**: id intervals, distributions, concurrency modes
//! - **Replication inputs**: per-seller product update histories and cart snapshots
//! - **Variate generation**: uniform and Zipfian id samplers

mod distribution;
mod identifiers;
mod product;
mod transaction;
mod workload;

pub use distribution::{IdSampler, SamplerError};
pub use identifiers::{CustomerId, ProductId, SellerId, Tid};
pub use product::{CartHistory, CartItem, ProductUpdate, ProductUpdateHistory};
pub use transaction::{
    Latency, MarkStatus, TransactionIdentifier, TransactionMark, TransactionOutput,
    TransactionType,
};
pub use workload::{ConcurrencyType, DistributionType, Interval};
