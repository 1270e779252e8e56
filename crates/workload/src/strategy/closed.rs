use super::{CancellationFlag, RunStrategy, RunWindow, TypeHistogram};
use crate::dispatch::Dispatcher;
use crate::error::WorkloadError;
use crate::mix::TransactionMix;
use chrono::Utc;
use marketbench_ports::CompletionSignal;
use marketbench_types::Tid;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::hint;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Who raises the completion signal in closed-loop mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// The offloaded task signals once the port call returns. For platforms
    /// whose transactions are finished when the call returns.
    #[default]
    OnReturn,
    /// The ports' completion path signals. For platforms that report
    /// completions asynchronously.
    ByPort,
}

/// Single driver keeping `level` transactions in flight.
///
/// The first `level - 1` transactions are submitted back to back. After that
/// the driver submits one transaction and waits for one completion signal
/// before submitting the next.
pub struct ClosedLoop {
    level: usize,
    execution_time: Duration,
    delay_between_requests: Duration,
    policy: SignalPolicy,
    signal: CompletionSignal,
    seed: u64,
    cancel: CancellationFlag,
}

impl ClosedLoop {
    pub fn new(
        level: usize,
        execution_time: Duration,
        signal: CompletionSignal,
        seed: u64,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            level,
            execution_time,
            delay_between_requests: Duration::ZERO,
            policy: SignalPolicy::default(),
            signal,
            seed,
            cancel,
        }
    }

    /// Pause after every submission. Zero disables throttling.
    pub fn with_delay_between_requests(mut self, delay: Duration) -> Self {
        self.delay_between_requests = delay;
        self
    }

    pub fn with_signal_policy(mut self, policy: SignalPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn throttle(&self) {
        if !self.delay_between_requests.is_zero() {
            thread::sleep(self.delay_between_requests);
        }
    }

    /// Busy-wait for one completion or the end of the window.
    ///
    /// Spinning keeps admission latency at the signal's own latency; the
    /// driver thread burns one core for the duration of the run.
    fn await_completion(&self, started: Instant) {
        loop {
            if self.signal.try_consume()
                || started.elapsed() >= self.execution_time
                || self.cancel.is_cancelled()
            {
                return;
            }
            hint::spin_loop();
        }
    }
}

impl RunStrategy for ClosedLoop {
    fn run(
        &self,
        dispatcher: Arc<Dispatcher>,
        mix: Arc<TransactionMix>,
    ) -> Result<RunWindow, WorkloadError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.level)
            .thread_name(|i| format!("closed-worker-{i}"))
            .build()?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut histogram = TypeHistogram::default();
        let mut next_tid: u64 = 1;

        let submit = |tid: u64, rng: &mut ChaCha8Rng, histogram: &mut TypeHistogram| {
            let tx_type = mix.pick(rng);
            histogram.record(tx_type);
            let task_seed: u64 = rng.gen();
            let dispatcher = Arc::clone(&dispatcher);
            let signal = (self.policy == SignalPolicy::OnReturn).then(|| self.signal.clone());
            pool.spawn(move || {
                let mut task_rng = ChaCha8Rng::seed_from_u64(task_seed);
                dispatcher.run_transaction(tx_type, &Tid::from(tid), &mut task_rng);
                if let Some(signal) = signal {
                    signal.notify();
                }
            });
        };

        self.signal.clear();
        let started = Instant::now();
        let start = Utc::now();
        info!(level = self.level, policy = ?self.policy, "Closed loop started");

        while next_tid < self.level as u64 && !self.cancel.is_cancelled() {
            submit(next_tid, &mut rng, &mut histogram);
            next_tid += 1;
            self.throttle();
        }

        while started.elapsed() < self.execution_time && !self.cancel.is_cancelled() {
            submit(next_tid, &mut rng, &mut histogram);
            next_tid += 1;
            self.await_completion(started);
            self.throttle();
        }

        let finish = Utc::now();
        let submitted = next_tid - 1;

        Ok(RunWindow {
            start,
            finish,
            submitted,
            last_tid: (submitted > 0).then(|| submitted.to_string()),
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketbench_ports::{
        Completion, CompletionPump, DeliveryPort, FixedDelayDeliveryPort, PlatformConfig,
        ServicePorts, SimCustomerPort, SimDeliveryPort, SimSellerPort, SimulatedPlatform,
    };
    use marketbench_types::{DistributionType, IdSampler, Interval, TransactionType};

    fn dispatcher_with(delivery: Arc<dyn DeliveryPort>, platform: Arc<SimulatedPlatform>) -> Arc<Dispatcher> {
        let ports = ServicePorts::new(
            Arc::new(SimSellerPort::new(Arc::clone(&platform), Completion::Synchronous)),
            Arc::new(SimCustomerPort::new(platform, Completion::Synchronous)),
            delivery,
        );
        let sampler = IdSampler::new(Interval::new(1, 1), DistributionType::Uniform).unwrap();
        Arc::new(Dispatcher::new(ports, sampler))
    }

    fn platform() -> Arc<SimulatedPlatform> {
        Arc::new(
            SimulatedPlatform::new(PlatformConfig::new(1, 1, 1).with_service_delay(Duration::ZERO))
                .unwrap(),
        )
    }

    fn delivery_mix() -> Arc<TransactionMix> {
        Arc::new(TransactionMix::new([(TransactionType::UpdateDelivery, 100)]).unwrap())
    }

    #[test]
    fn test_in_flight_bounded_by_level() {
        // 10ms per transaction, 4 in flight, 200ms: about 80 transactions.
        let delivery = Arc::new(FixedDelayDeliveryPort::new(Duration::from_millis(10)));
        let dispatcher = dispatcher_with(Arc::clone(&delivery) as Arc<dyn DeliveryPort>, platform());
        let strategy = ClosedLoop::new(
            4,
            Duration::from_millis(200),
            CompletionSignal::new(),
            3,
            CancellationFlag::new(),
        );

        let window = strategy.run(dispatcher, delivery_mix()).unwrap();

        let elapsed = (window.finish - window.start).num_milliseconds();
        assert!((200..400).contains(&elapsed), "elapsed {elapsed}ms");
        assert!(window.submitted >= 4);
        assert!(window.submitted <= 4 + 200 / 10 * 4 + 4, "submitted {}", window.submitted);
        assert_eq!(window.last_tid, Some(window.submitted.to_string()));
    }

    #[test]
    fn test_port_signals_drive_admission() {
        let signal = CompletionSignal::new();
        let pump = Arc::new(CompletionPump::spawn(Duration::from_millis(5), signal.clone()).unwrap());
        let platform = platform();
        let delivery = Arc::new(SimDeliveryPort::new(
            Arc::clone(&platform),
            Completion::Asynchronous(Arc::clone(&pump)),
        ));
        let dispatcher = dispatcher_with(Arc::clone(&delivery) as Arc<dyn DeliveryPort>, platform);
        let strategy = ClosedLoop::new(
            2,
            Duration::from_millis(150),
            signal,
            9,
            CancellationFlag::new(),
        )
        .with_signal_policy(SignalPolicy::ByPort);

        let window = strategy.run(dispatcher, delivery_mix()).unwrap();
        // Let offloaded tasks still queued in the pool reach the port.
        thread::sleep(Duration::from_millis(50));
        assert!(pump.quiesce(Duration::from_secs(5)));

        // Admission follows the pump: far more than the level, far less than spinning freely.
        assert!(window.submitted > 2);
        assert!(window.submitted < 150);
        assert_eq!(delivery.drain_finished().len() as u64, window.submitted);
    }

    #[test]
    fn test_failed_sessions_still_admit_next_submission() {
        let signal = CompletionSignal::new();
        let pump = Arc::new(CompletionPump::spawn(Duration::from_millis(1), signal.clone()).unwrap());
        let platform = platform();
        let ports = ServicePorts::new(
            Arc::new(SimSellerPort::new(Arc::clone(&platform), Completion::Synchronous)),
            Arc::new(SimCustomerPort::new(
                Arc::clone(&platform),
                Completion::Asynchronous(Arc::clone(&pump)),
            )),
            Arc::new(SimDeliveryPort::new(platform, Completion::Synchronous)),
        );
        let sampler = IdSampler::new(Interval::new(1, 1), DistributionType::Uniform).unwrap();
        let dispatcher = Arc::new(Dispatcher::new(ports, sampler));
        // The platform only knows customer 1, so every session fails.
        dispatcher.customers().repopulate(Interval::new(2, 3));
        let mix = Arc::new(TransactionMix::new([(TransactionType::CustomerSession, 100)]).unwrap());
        let strategy = ClosedLoop::new(
            1,
            Duration::from_millis(150),
            signal,
            5,
            CancellationFlag::new(),
        )
        .with_signal_policy(SignalPolicy::ByPort);

        let window = strategy.run(dispatcher, mix).unwrap();

        // A lost signal would hold the single slot until the deadline.
        assert!(window.submitted > 5, "submitted {}", window.submitted);
    }

    #[test]
    fn test_level_one_submits_one_at_a_time() {
        let delivery = Arc::new(FixedDelayDeliveryPort::new(Duration::from_millis(20)));
        let dispatcher = dispatcher_with(Arc::clone(&delivery) as Arc<dyn DeliveryPort>, platform());
        let strategy = ClosedLoop::new(
            1,
            Duration::from_millis(100),
            CompletionSignal::new(),
            1,
            CancellationFlag::new(),
        );

        let window = strategy.run(dispatcher, delivery_mix()).unwrap();
        assert!(window.submitted >= 1 && window.submitted <= 7, "submitted {}", window.submitted);
    }
}
