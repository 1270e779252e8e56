//! Multi-run experiment orchestration.

use crate::config::{CompletionMode, ExperimentConfig, RunSection};
use crate::error::DriverError;
use chrono::{DateTime, Utc};
use marketbench_metrics::{CollectedRun, MetricCollector};
use marketbench_ports::{
    Completion, CompletionPump, CompletionSignal, ServicePorts, SimCustomerPort, SimDeliveryPort,
    SimSellerPort, SimulatedPlatform,
};
use marketbench_workload::{RunWindow, TransactionScheduler};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on waiting for asynchronous completions after a run.
const QUIESCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub name: String,
    pub window: RunWindow,
    pub collected: CollectedRun,
}

/// Runs every `[[runs]]` entry of an experiment back to back.
pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Execute all runs, writing one report per run.
    pub fn run(&self) -> Result<Vec<RunOutcome>, DriverError> {
        let total = self.config.runs.len();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, run) in self.config.runs.iter().enumerate() {
            info!(run = idx, total, "Starting experiment run");
            outcomes.push(self.run_once(idx, run)?);

            let delay = self.config.delay_between_runs();
            if idx + 1 < total && !delay.is_zero() {
                info!(delay = ?delay, "Waiting before next run");
                thread::sleep(delay);
            }
        }

        info!(runs = outcomes.len(), "Experiment finished");
        Ok(outcomes)
    }

    fn run_once(&self, idx: usize, run: &RunSection) -> Result<RunOutcome, DriverError> {
        let platform = Arc::new(SimulatedPlatform::new(self.config.platform_config(run))?);
        let signal = CompletionSignal::new();

        let pump = match self.config.platform.completion {
            CompletionMode::Synchronous => None,
            CompletionMode::Asynchronous { delay_ms } => Some(Arc::new(
                CompletionPump::spawn(Duration::from_millis(delay_ms), signal.clone())
                    .map_err(DriverError::CompletionPump)?,
            )),
        };
        let completion = match &pump {
            Some(pump) => Completion::Asynchronous(Arc::clone(pump)),
            None => Completion::Synchronous,
        };

        let ports = ServicePorts::new(
            Arc::new(SimSellerPort::new(Arc::clone(&platform), completion.clone())),
            Arc::new(SimCustomerPort::new(Arc::clone(&platform), completion.clone())),
            Arc::new(SimDeliveryPort::new(Arc::clone(&platform), completion)),
        );

        let mut scheduler = TransactionScheduler::new(
            self.config.scheduler_config(run)?,
            ports.clone(),
            signal,
        )?;
        scheduler.setup()?;
        let window = scheduler.run()?;

        if let Some(pump) = &pump {
            if !pump.quiesce(QUIESCE_TIMEOUT) {
                warn!(
                    run = idx,
                    in_flight = pump.in_flight(),
                    timeout = ?QUIESCE_TIMEOUT,
                    "Completions still pending, collecting anyway"
                );
            }
        }

        let name = run_name(&self.config, idx, run, window.start);
        let mut collector = MetricCollector::new(ports, self.config.output_dir.clone());
        collector.setup(self.config.platform.num_sellers, self.config.platform.num_customers);

        let collected = if self.config.workload.simple_collect {
            collector.simple_collect(window.start, window.finish, 0, Some(&name))?
        } else {
            collector.collect(
                window.start,
                window.finish,
                self.config.workload.epoch_period_ms,
                Some(&name),
            )?
        };

        info!(
            run = %name,
            report = %collected.path.display(),
            submitted = window.submitted,
            completed = collected.report.throughput.completed,
            "Run complete"
        );
        Ok(RunOutcome {
            name,
            window,
            collected,
        })
    }
}

/// `"{start ms}#{idx}_{customers}_{concurrency}_{products}_{seller dist}_{key dist}"`.
pub fn run_name(
    config: &ExperimentConfig,
    idx: usize,
    run: &RunSection,
    start: DateTime<Utc>,
) -> String {
    format!(
        "{}#{}_{}_{}_{}_{}_{}",
        start.timestamp_millis(),
        idx,
        config.platform.num_customers,
        config.workload.concurrency_level,
        run.products_per_seller,
        run.seller_distribution,
        run.key_distribution
    )
}
