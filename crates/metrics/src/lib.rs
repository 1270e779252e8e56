//! Post-run metrics for the marketplace benchmark driver.
//!
//! After a run the [`MetricCollector`] drains the service ports and turns
//! their records into a [`RunReport`]:
//!
//! - **Latency**: submissions joined with completions per tid, with bounded
//!   clock-skew correction ([`TransactionLedger`])
//! - **Throughput and percentiles**: per transaction type, overall and per
//!   epoch
//! - **Aborts**: counts per type, grouped by source for sellers and customers
//! - **Replication anomalies**: carts whose items break causal consistency
//!   against the sellers' update histories

mod aborts;
mod anomaly;
mod collector;
mod epoch;
mod error;
mod latency;
mod report;
mod stats;

pub use aborts::{aggregate_aborts, AbortSummary};
pub use anomaly::{count_replication_anomalies, detect_replication_anomalies, ReplicationAnomaly};
pub use collector::{CollectedRun, MetricCollector};
pub use epoch::{breakdown, EpochBlock, EpochBreakdown};
pub use error::MetricsError;
pub use latency::{build_latency_list, LatencyBuild, TransactionLedger, CLOCK_SKEW_TOLERANCE_MS};
pub use report::{RunReport, ThroughputSummary};
pub use stats::{percentile_sorted, summarize_by_type, throughput, LatencySummary, PERCENTILES};
