//! Service ports for the benchmark driver.
//!
//! A port is the driver-side endpoint of one role of the target platform
//! (seller, customer, delivery). The scheduler calls `run` on a port to execute
//! a transaction; the port records what it submitted, what finished and what
//! aborted, and the metric collector later drains those records.
//!
//! # Port variants
//!
//! Each role has one trait and several implementations chosen at construction:
//!
//! - **Synchronous**: the transaction is finished as soon as the platform answers
//! - **Asynchronous completion**: completions arrive later through a
//!   [`CompletionPump`], which also raises the shared [`CompletionSignal`]
//! - **Fixed delay**: [`FixedDelayDeliveryPort`] simulates a platform with a
//!   constant service time and no state at all

mod error;
mod log;
mod signal;
pub mod sim;
mod traits;

pub use error::PortError;
pub use log::TransactionLog;
pub use signal::CompletionSignal;
pub use sim::{
    Completion, CompletionPump, FixedDelayDeliveryPort, PlatformConfig, SimCustomerPort,
    SimDeliveryPort, SimSellerPort, SimulatedPlatform,
};
pub use traits::{CustomerPort, DeliveryPort, SellerPort, ServicePorts};
