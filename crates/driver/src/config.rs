//! Experiment configuration, loaded from TOML.
//!
//! ```toml
//! output_dir = "results"
//! delay_between_runs_ms = 1000
//!
//! [platform]
//! num_sellers = 10
//! num_customers = 100
//! completion = { mode = "asynchronous", delay_ms = 5 }
//!
//! [workload]
//! concurrency_level = 8
//! concurrency_type = "closed"
//! execution_time_ms = 60000
//! epoch_period_ms = 10000
//! transaction_distribution = [
//!     { tx_type = "PRICE_UPDATE", cutoff = 10 },
//!     { tx_type = "CUSTOMER_SESSION", cutoff = 100 },
//! ]
//!
//! [[runs]]
//! products_per_seller = 1000
//! key_distribution = { kind = "zipfian", skew = 0.99 }
//! ```

use crate::error::ConfigError;
use marketbench_ports::PlatformConfig;
use marketbench_types::{ConcurrencyType, DistributionType, Interval, TransactionType};
use marketbench_workload::{SchedulerConfig, SignalPolicy, TransactionMix};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A whole experiment: one platform and workload shape, several runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Directory run reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Pause between consecutive runs.
    #[serde(default)]
    pub delay_between_runs_ms: u64,

    pub platform: PlatformSection,

    pub workload: WorkloadSection,

    /// Executed in order, each on a fresh platform.
    pub runs: Vec<RunSection>,
}

/// Population and behaviour of the simulated platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformSection {
    pub num_sellers: u32,

    pub num_customers: u32,

    /// Service time of every write request.
    #[serde(default = "default_service_delay_ms")]
    pub service_delay_ms: u64,

    #[serde(default)]
    pub abort_probability: f64,

    #[serde(default)]
    pub stale_read_probability: f64,

    #[serde(default = "default_items_per_cart")]
    pub items_per_cart: Interval,

    /// Percentage of customer sessions that end in a checkout.
    #[serde(default = "default_checkout_probability")]
    pub checkout_probability: u32,

    #[serde(default = "default_initial_price")]
    pub initial_price: f64,

    /// Fill each cart from a single sampled seller.
    #[serde(default)]
    pub unique_seller: bool,

    /// Checkout requests per session before it counts as aborted.
    #[serde(default = "default_max_checkout_attempts")]
    pub max_checkout_attempts: u32,

    #[serde(default)]
    pub completion: CompletionMode,
}

/// How the platform reports finished transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompletionMode {
    /// Finished when the port call returns.
    #[default]
    Synchronous,

    /// Finished `delay_ms` after the port call, on a completion pump.
    Asynchronous { delay_ms: u64 },
}

impl CompletionMode {
    /// Closed-loop signalling matching this completion mode.
    pub fn signal_policy(self) -> SignalPolicy {
        match self {
            CompletionMode::Synchronous => SignalPolicy::OnReturn,
            CompletionMode::Asynchronous { .. } => SignalPolicy::ByPort,
        }
    }
}

/// Workload shape shared by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadSection {
    /// Cumulative cutoffs, in the order they are checked.
    pub transaction_distribution: Vec<MixEntry>,

    #[serde(default = "default_concurrency_level")]
    pub concurrency_level: usize,

    #[serde(default)]
    pub concurrency_type: ConcurrencyType,

    pub execution_time_ms: u64,

    #[serde(default)]
    pub delay_between_requests_ms: u64,

    /// Epoch breakdown period. Zero disables it.
    #[serde(default)]
    pub epoch_period_ms: u64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Write throughput-only reports.
    #[serde(default)]
    pub simple_collect: bool,
}

/// One `transaction type -> cumulative cutoff` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixEntry {
    pub tx_type: TransactionType,
    pub cutoff: u32,
}

/// Parameters that vary between runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub products_per_seller: u32,

    #[serde(default)]
    pub seller_distribution: DistributionType,

    #[serde(default)]
    pub key_distribution: DistributionType,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_service_delay_ms() -> u64 {
    1
}

fn default_items_per_cart() -> Interval {
    Interval::new(1, 5)
}

fn default_checkout_probability() -> u32 {
    100
}

fn default_initial_price() -> f64 {
    100.0
}

fn default_max_checkout_attempts() -> u32 {
    3
}

fn default_concurrency_level() -> usize {
    1
}

fn default_seed() -> u64 {
    12345
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ExperimentConfig {
    /// Load and validate an experiment from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate an experiment from a TOML string.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.workload.execution_time_ms = millis(execution_time);
        self
    }

    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.workload.concurrency_level = level;
        self
    }

    pub fn with_concurrency_type(mut self, concurrency_type: ConcurrencyType) -> Self {
        self.workload.concurrency_type = concurrency_type;
        self
    }

    /// Set the epoch period. Zero disables the breakdown.
    pub fn with_epoch_period(mut self, epoch: Duration) -> Self {
        self.workload.epoch_period_ms = millis(epoch);
        self
    }

    pub fn execution_time(&self) -> Duration {
        Duration::from_millis(self.workload.execution_time_ms)
    }

    pub fn delay_between_runs(&self) -> Duration {
        Duration::from_millis(self.delay_between_runs_ms)
    }

    /// Check every field that a run would otherwise trip over mid-experiment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let platform = &self.platform;
        if platform.num_sellers == 0 || platform.num_customers == 0 {
            return Err(ConfigError::Invalid(
                "num_sellers and num_customers must be at least 1".into(),
            ));
        }
        if !platform.items_per_cart.is_valid() || platform.items_per_cart.min == 0 {
            return Err(ConfigError::Invalid(format!(
                "items_per_cart {} must be a non-empty range starting at 1 or more",
                platform.items_per_cart
            )));
        }
        for (name, probability) in [
            ("abort_probability", platform.abort_probability),
            ("stale_read_probability", platform.stale_read_probability),
        ] {
            if !(0.0..=1.0).contains(&probability) {
                return Err(ConfigError::Invalid(format!(
                    "{name} {probability} is outside [0, 1]"
                )));
            }
        }
        if platform.checkout_probability > 100 {
            return Err(ConfigError::Invalid(format!(
                "checkout_probability {} exceeds 100",
                platform.checkout_probability
            )));
        }

        if platform.max_checkout_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_checkout_attempts must be at least 1".into(),
            ));
        }

        if self.workload.concurrency_level == 0 {
            return Err(ConfigError::Invalid(
                "concurrency_level must be at least 1".into(),
            ));
        }
        if self.workload.execution_time_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution_time_ms must be positive".into(),
            ));
        }
        self.mix()?;

        if self.runs.is_empty() {
            return Err(ConfigError::Invalid("no [[runs]] configured".into()));
        }
        if let Some(idx) = self.runs.iter().position(|r| r.products_per_seller == 0) {
            return Err(ConfigError::Invalid(format!(
                "run {idx} has no products per seller"
            )));
        }
        Ok(())
    }

    /// The transaction mix, in configured order.
    pub fn mix(&self) -> Result<TransactionMix, ConfigError> {
        let entries = self
            .workload
            .transaction_distribution
            .iter()
            .map(|e| (e.tx_type, e.cutoff));
        Ok(TransactionMix::new(entries)?)
    }

    /// Platform configuration of one run.
    pub fn platform_config(&self, run: &RunSection) -> PlatformConfig {
        let platform = &self.platform;
        let mut config = PlatformConfig::new(
            platform.num_sellers,
            run.products_per_seller,
            platform.num_customers,
        )
        .with_service_delay(Duration::from_millis(platform.service_delay_ms))
        .with_abort_probability(platform.abort_probability)
        .with_stale_read_probability(platform.stale_read_probability)
        .with_items_per_cart(platform.items_per_cart)
        .with_checkout_probability(platform.checkout_probability)
        .with_unique_seller(platform.unique_seller)
        .with_max_checkout_attempts(platform.max_checkout_attempts)
        .with_distributions(run.seller_distribution, run.key_distribution);
        config.initial_price = platform.initial_price;
        config
    }

    /// Scheduler configuration of one run.
    pub fn scheduler_config(&self, run: &RunSection) -> Result<SchedulerConfig, ConfigError> {
        let workload = &self.workload;
        let config = SchedulerConfig::new(
            self.mix()?,
            Interval::new(1, self.platform.num_customers),
            Interval::new(1, self.platform.num_sellers),
        )
        .with_seller_distribution(run.seller_distribution)
        .with_concurrency(workload.concurrency_level, workload.concurrency_type)
        .with_execution_time(self.execution_time())
        .with_delay_between_requests(Duration::from_millis(workload.delay_between_requests_ms))
        .with_signal_policy(self.platform.completion.signal_policy())
        .with_seed(workload.seed);
        Ok(config)
    }
}
