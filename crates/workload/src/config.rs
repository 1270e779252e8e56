//! Scheduler configuration, fixed for the duration of a run.

use crate::error::WorkloadError;
use crate::mix::TransactionMix;
use crate::strategy::SignalPolicy;
use marketbench_types::{ConcurrencyType, DistributionType, Interval};
use std::time::Duration;

/// Configuration for one scheduler run.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Cumulative cutoffs of the transaction types.
    pub mix: TransactionMix,

    /// Customer ids fed to the idle pool.
    pub customer_range: Interval,

    /// Seller ids sampled for seller transactions.
    pub seller_range: Interval,

    /// Distribution of sampled seller ids.
    pub seller_distribution: DistributionType,

    /// Worker threads (open loop) or transactions in flight (closed loop).
    pub concurrency_level: usize,

    pub concurrency_type: ConcurrencyType,

    /// Length of the measurement window.
    pub execution_time: Duration,

    /// Closed-loop pause after each submission. Zero disables throttling.
    pub delay_between_requests: Duration,

    /// Who raises the closed-loop completion signal.
    pub signal_policy: SignalPolicy,

    /// Seed of the type and seller id draws.
    pub seed: u64,
}

impl SchedulerConfig {
    /// Create a configuration with the given mix and id ranges.
    pub fn new(mix: TransactionMix, customer_range: Interval, seller_range: Interval) -> Self {
        Self {
            mix,
            customer_range,
            seller_range,
            seller_distribution: DistributionType::Uniform,
            concurrency_level: 1,
            concurrency_type: ConcurrencyType::Open,
            execution_time: Duration::from_secs(10),
            delay_between_requests: Duration::ZERO,
            signal_policy: SignalPolicy::OnReturn,
            seed: 12345,
        }
    }

    pub fn with_seller_distribution(mut self, distribution: DistributionType) -> Self {
        self.seller_distribution = distribution;
        self
    }

    /// Set concurrency level and discipline.
    pub fn with_concurrency(mut self, level: usize, concurrency_type: ConcurrencyType) -> Self {
        self.concurrency_level = level;
        self.concurrency_type = concurrency_type;
        self
    }

    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = execution_time;
        self
    }

    pub fn with_delay_between_requests(mut self, delay: Duration) -> Self {
        self.delay_between_requests = delay;
        self
    }

    pub fn with_signal_policy(mut self, policy: SignalPolicy) -> Self {
        self.signal_policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the invariants the scheduler relies on.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        if self.concurrency_level == 0 {
            return Err(WorkloadError::InvalidConfig(
                "concurrency level must be at least 1".into(),
            ));
        }
        if !self.customer_range.is_valid() {
            return Err(WorkloadError::InvalidConfig(format!(
                "customer range {} is empty",
                self.customer_range
            )));
        }
        if !self.seller_range.is_valid() {
            return Err(WorkloadError::InvalidConfig(format!(
                "seller range {} is empty",
                self.seller_range
            )));
        }
        if self.execution_time.is_zero() {
            return Err(WorkloadError::InvalidConfig(
                "execution time must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketbench_types::TransactionType;

    fn mix() -> TransactionMix {
        TransactionMix::new([(TransactionType::CustomerSession, 100)]).unwrap()
    }

    #[test]
    fn test_builder_and_validate() {
        let config = SchedulerConfig::new(mix(), Interval::new(1, 10), Interval::new(1, 3))
            .with_concurrency(8, ConcurrencyType::Closed)
            .with_execution_time(Duration::from_secs(1))
            .with_seed(7);

        assert_eq!(config.concurrency_level, 8);
        assert_eq!(config.concurrency_type, ConcurrencyType::Closed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_settings() {
        let base = SchedulerConfig::new(mix(), Interval::new(1, 10), Interval::new(1, 3));

        assert!(base
            .clone()
            .with_concurrency(0, ConcurrencyType::Open)
            .validate()
            .is_err());
        assert!(SchedulerConfig::new(mix(), Interval::new(2, 1), Interval::new(1, 3))
            .validate()
            .is_err());
        assert!(base.with_execution_time(Duration::ZERO).validate().is_err());
    }
}
