//! Post-run metric collection over the service ports.

use crate::aborts::aggregate_aborts;
use crate::anomaly::count_replication_anomalies;
use crate::epoch::breakdown;
use crate::error::MetricsError;
use crate::latency::{elapsed_millis, LatencyBuild, TransactionLedger};
use crate::report::{RunReport, ThroughputSummary};
use crate::stats::{summarize_by_type, throughput};
use chrono::{DateTime, Utc};
use marketbench_ports::ServicePorts;
use marketbench_types::{CustomerId, Latency, SellerId};
use std::path::PathBuf;
use tracing::{debug, info};

/// Report produced by a collection, and where it was written.
#[derive(Debug, Clone)]
pub struct CollectedRun {
    pub report: RunReport,
    pub path: PathBuf,
}

/// Drains the ports after a run and writes the report.
pub struct MetricCollector {
    ports: ServicePorts,
    output_dir: PathBuf,
    num_sellers: u32,
    num_customers: u32,
}

impl MetricCollector {
    pub fn new(ports: ServicePorts, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ports,
            output_dir: output_dir.into(),
            num_sellers: 0,
            num_customers: 0,
        }
    }

    /// Set the id ranges `1..=num_sellers` and `1..=num_customers` to drain.
    pub fn setup(&mut self, num_sellers: u32, num_customers: u32) {
        self.num_sellers = num_sellers;
        self.num_customers = num_customers;
    }

    /// Full collection: latencies, throughput, optional epochs, aborts and
    /// replication anomalies.
    ///
    /// `epoch_ms` of 0 disables the epoch breakdown.
    pub fn collect(
        &self,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
        epoch_ms: u64,
        run_name: Option<&str>,
    ) -> Result<CollectedRun, MetricsError> {
        check_window(start, finish)?;
        info!(%start, %finish, "Collecting metrics");

        let latencies = self.gather_latencies(finish);
        let summaries = summarize_by_type(&latencies);
        let throughput = throughput_summary(latencies.len() as u64, start, finish);

        let epochs = if epoch_ms > 0 {
            breakdown(&latencies, start, finish, epoch_ms)
        } else {
            None
        };

        let aborts = aggregate_aborts(
            &self.ports.seller.drain_aborted(),
            &self.ports.customer.drain_aborted(),
            &self.ports.delivery.drain_aborted(),
        );

        let updates = self.ports.seller.tracked_product_updates();
        let carts = self.ports.customer.cart_history(finish);
        let anomalies = count_replication_anomalies(&updates, &carts);

        let report = RunReport {
            start,
            finish,
            summaries,
            throughput,
            epochs,
            aborts: Some(aborts),
            anomalies,
        };
        let path = self.write(&report, run_name)?;
        info!(path = %path.display(), "Finished collecting metrics");
        Ok(CollectedRun { report, path })
    }

    /// Throughput-only collection for platforms that cannot report every
    /// completion. `extra_completed` is added to the completions the ports
    /// did record.
    pub fn simple_collect(
        &self,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
        extra_completed: u64,
        run_name: Option<&str>,
    ) -> Result<CollectedRun, MetricsError> {
        check_window(start, finish)?;

        let latencies = self.gather_latencies(finish);
        let summaries = summarize_by_type(&latencies);
        let completed = extra_completed + latencies.len() as u64;

        let report = RunReport {
            start,
            finish,
            summaries,
            throughput: throughput_summary(completed, start, finish),
            epochs: None,
            aborts: None,
            anomalies: 0,
        };
        let path = self.write(&report, run_name)?;
        Ok(CollectedRun { report, path })
    }

    fn gather_latencies(&self, finish: DateTime<Utc>) -> Vec<Latency> {
        let mut seller = TransactionLedger::new("seller");
        for id in (1..=self.num_sellers).map(SellerId) {
            seller.add_submitted(self.ports.seller.drain_submitted(id));
            seller.add_finished(self.ports.seller.drain_finished(id));
        }

        let mut customer = TransactionLedger::new("customer");
        for id in (1..=self.num_customers).map(CustomerId) {
            customer.add_submitted(self.ports.customer.drain_submitted(id));
            customer.add_finished(self.ports.customer.drain_finished(id));
        }

        let mut delivery = TransactionLedger::new("delivery");
        delivery.add_submitted(self.ports.delivery.drain_submitted());
        delivery.add_finished(self.ports.delivery.drain_finished());

        let mut latencies = Vec::new();
        for (role, ledger) in [("seller", seller), ("customer", customer), ("delivery", delivery)] {
            let LatencyBuild {
                latencies: built,
                orphans,
                skew_corrected,
                dropped,
            } = ledger.build_latency_list(finish);
            debug!(
                role,
                samples = built.len(),
                orphans,
                skew_corrected,
                dropped,
                "Latency samples built"
            );
            latencies.extend(built);
        }
        latencies
    }

    fn write(&self, report: &RunReport, run_name: Option<&str>) -> Result<PathBuf, MetricsError> {
        for line in report.to_string().lines() {
            info!("{line}");
        }
        report.write_to(&self.output_dir, run_name)
    }
}

fn check_window(start: DateTime<Utc>, finish: DateTime<Utc>) -> Result<(), MetricsError> {
    if finish < start {
        return Err(MetricsError::InvertedWindow {
            start: start.to_string(),
            finish: finish.to_string(),
        });
    }
    Ok(())
}

fn throughput_summary(completed: u64, start: DateTime<Utc>, finish: DateTime<Utc>) -> ThroughputSummary {
    let seconds = elapsed_millis(start, finish) / 1000.0;
    ThroughputSummary {
        seconds,
        completed,
        per_second: throughput(completed, seconds),
    }
}
