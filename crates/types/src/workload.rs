//! Workload parameter types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive integer range, used for customer and seller id ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub min: u32,
    pub max: u32,
}

impl Interval {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Whether `min <= max`.
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Number of values in the range (zero when invalid).
    pub fn len(&self) -> usize {
        if self.is_valid() {
            (self.max - self.min) as usize + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Iterate over every value in the range.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.min..=self.max
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Distribution used to sample seller and product ids.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionType {
    /// Every id equally likely.
    #[default]
    Uniform,

    /// Low ids dominate; `skew` controls how strongly.
    Zipfian {
        /// Zipf exponent (0 = uniform, 1 = classic Zipf, higher = hotter hotspots).
        skew: f64,
    },
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionType::Uniform => f.write_str("UNIFORM"),
            DistributionType::Zipfian { skew } => write!(f, "ZIPFIAN({skew})"),
        }
    }
}

/// Concurrency discipline of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyType {
    /// Fixed number of worker threads issuing transactions continuously.
    #[default]
    #[serde(alias = "continuous")]
    Open,

    /// Single driver keeping a bounded number of transactions in flight.
    #[serde(alias = "control")]
    Closed,
}

impl fmt::Display for ConcurrencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyType::Open => f.write_str("OPEN"),
            ConcurrencyType::Closed => f.write_str("CLOSED"),
        }
    }
}
