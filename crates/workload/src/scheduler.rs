//! Transaction scheduler: wires the mix, the dispatcher and a run strategy.

use crate::config::SchedulerConfig;
use crate::dispatch::Dispatcher;
use crate::error::WorkloadError;
use crate::strategy::{CancellationFlag, ClosedLoop, OpenLoop, RunStrategy, RunWindow};
use marketbench_ports::{CompletionSignal, ServicePorts};
use marketbench_types::{ConcurrencyType, IdSampler, TransactionType};
use std::sync::Arc;
use tracing::{debug, info};

/// Generates the workload of one run against the service ports.
pub struct TransactionScheduler {
    config: SchedulerConfig,
    ports: ServicePorts,
    signal: CompletionSignal,
    cancel: CancellationFlag,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl TransactionScheduler {
    /// Create a scheduler. `signal` is the queue completions are announced on.
    pub fn new(
        config: SchedulerConfig,
        ports: ServicePorts,
        signal: CompletionSignal,
    ) -> Result<Self, WorkloadError> {
        config.validate()?;
        Ok(Self {
            config,
            ports,
            signal,
            cancel: CancellationFlag::new(),
            dispatcher: None,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Handle that stops a running open or closed loop early.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Prepare a run: seller sampler, fresh idle-customer pool.
    pub fn setup(&mut self) -> Result<(), WorkloadError> {
        let sampler = IdSampler::new(self.config.seller_range, self.config.seller_distribution)?;
        let dispatcher = Dispatcher::new(self.ports.clone(), sampler);
        dispatcher.customers().repopulate(self.config.customer_range);
        debug!(
            idle_customers = dispatcher.customers().idle(),
            seller_distribution = %self.config.seller_distribution,
            "Scheduler set up"
        );

        self.dispatcher = Some(Arc::new(dispatcher));
        self.cancel.reset();
        self.signal.clear();
        Ok(())
    }

    /// Run for the configured execution time and return the window.
    pub fn run(&self) -> Result<RunWindow, WorkloadError> {
        let dispatcher = self.dispatcher.clone().ok_or(WorkloadError::NotSetUp)?;
        let mix = Arc::new(self.config.mix.clone());

        info!(
            concurrency_type = %self.config.concurrency_type,
            concurrency_level = self.config.concurrency_level,
            execution_time = ?self.config.execution_time,
            mix = %self.config.mix,
            "Starting run"
        );

        let strategy: Box<dyn RunStrategy> = match self.config.concurrency_type {
            ConcurrencyType::Open => Box::new(OpenLoop::new(
                self.config.concurrency_level,
                self.config.execution_time,
                self.config.seed,
                self.cancel.clone(),
            )),
            ConcurrencyType::Closed => Box::new(
                ClosedLoop::new(
                    self.config.concurrency_level,
                    self.config.execution_time,
                    self.signal.clone(),
                    self.config.seed,
                    self.cancel.clone(),
                )
                .with_delay_between_requests(self.config.delay_between_requests)
                .with_signal_policy(self.config.signal_policy),
            ),
        };

        let window = strategy.run(dispatcher, mix)?;
        log_histogram(&window);
        Ok(window)
    }
}

fn log_histogram(window: &RunWindow) {
    info!(
        submitted = window.submitted,
        last_tid = window.last_tid.as_deref().unwrap_or("-"),
        start = %window.start,
        finish = %window.finish,
        "Run finished"
    );
    for tx_type in TransactionType::ALL {
        let count = window.histogram.get(tx_type);
        if count > 0 {
            info!(%tx_type, count, "Submitted transactions");
        }
    }
}
