//! Transaction scheduler for the marketplace benchmark driver.
//!
//! The scheduler draws transaction types from a [`TransactionMix`] and hands
//! them to a [`Dispatcher`], which routes each one to the right service port.
//! How many transactions run at once is decided by the run strategy:
//!
//! - **Open loop** ([`OpenLoop`]): `concurrency_level` worker threads submit
//!   back to back until the window closes
//! - **Closed loop** ([`ClosedLoop`]): a single driver keeps at most
//!   `concurrency_level` transactions in flight, admitting a new one per
//!   completion signal
//!
//! Customer sessions lease their customer id from an [`IdleCustomerPool`], so
//! a customer never runs two sessions concurrently.

mod config;
mod customer_pool;
mod dispatch;
mod error;
mod mix;
mod scheduler;
pub mod strategy;

pub use config::SchedulerConfig;
pub use customer_pool::{CustomerLease, IdleCustomerPool};
pub use dispatch::Dispatcher;
pub use error::WorkloadError;
pub use mix::TransactionMix;
pub use scheduler::TransactionScheduler;
pub use strategy::{
    CancellationFlag, ClosedLoop, OpenLoop, RunStrategy, RunWindow, SignalPolicy, TypeHistogram,
};
