use super::{sleep_until, CancellationFlag, RunStrategy, RunWindow, TypeHistogram};
use crate::dispatch::Dispatcher;
use crate::error::WorkloadError;
use crate::mix::TransactionMix;
use chrono::Utc;
use crossbeam::channel;
use crossbeam::sync::WaitGroup;
use marketbench_types::Tid;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

struct WorkerReport {
    histogram: TypeHistogram,
    submitted: u64,
    last_tid: Option<Tid>,
}

/// Fixed number of workers issuing transactions back to back.
///
/// Workers rendezvous with the controller before the window opens, so the
/// start timestamp is taken only once every worker is ready. When the window
/// closes the controller raises the cancellation flag; transactions already
/// dispatched run to completion.
#[derive(Debug, Clone)]
pub struct OpenLoop {
    workers: usize,
    execution_time: Duration,
    seed: u64,
    cancel: CancellationFlag,
}

impl OpenLoop {
    pub fn new(workers: usize, execution_time: Duration, seed: u64, cancel: CancellationFlag) -> Self {
        Self {
            workers,
            execution_time,
            seed,
            cancel,
        }
    }

    fn spawn_worker(
        &self,
        worker: usize,
        dispatcher: &Arc<Dispatcher>,
        mix: &Arc<TransactionMix>,
        ready: WaitGroup,
        gate: channel::Receiver<()>,
    ) -> std::io::Result<JoinHandle<WorkerReport>> {
        let dispatcher = Arc::clone(dispatcher);
        let mix = Arc::clone(mix);
        let cancel = self.cancel.clone();
        let seed = self.seed.wrapping_add(worker as u64);

        thread::Builder::new()
            .name(format!("open-worker-{worker}"))
            .spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let mut report = WorkerReport {
                    histogram: TypeHistogram::default(),
                    submitted: 0,
                    last_tid: None,
                };

                drop(ready);
                // Released when the controller drops the sender.
                let _ = gate.recv();

                while !cancel.is_cancelled() {
                    let tx_type = mix.pick(&mut rng);
                    report.submitted += 1;
                    let tid = Tid::for_worker(worker, report.submitted);
                    report.histogram.record(tx_type);
                    dispatcher.run_transaction(tx_type, &tid, &mut rng);
                    report.last_tid = Some(tid);
                }
                report
            })
    }
}

impl RunStrategy for OpenLoop {
    fn run(
        &self,
        dispatcher: Arc<Dispatcher>,
        mix: Arc<TransactionMix>,
    ) -> Result<RunWindow, WorkloadError> {
        let ready = WaitGroup::new();
        let (release, gate) = channel::bounded::<()>(0);
        let mut handles = Vec::with_capacity(self.workers);

        for worker in 0..self.workers {
            match self.spawn_worker(worker, &dispatcher, &mix, ready.clone(), gate.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.cancel.cancel();
                    drop(release);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(WorkloadError::Spawn(e));
                }
            }
        }

        ready.wait();
        let started = Instant::now();
        let start = Utc::now();
        drop(release);
        info!(workers = self.workers, "Open loop started");

        sleep_until(started + self.execution_time, &self.cancel);
        let finish = Utc::now();
        self.cancel.cancel();
        debug!("Open loop window closed, joining workers");

        let mut histogram = TypeHistogram::default();
        let mut submitted = 0;
        let mut last_tid = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            let report = handle
                .join()
                .map_err(|_| WorkloadError::WorkerPanicked(worker))?;
            histogram.merge(&report.histogram);
            submitted += report.submitted;
            if report.last_tid.is_some() {
                last_tid = report.last_tid.map(|tid| tid.0);
            }
        }

        Ok(RunWindow {
            start,
            finish,
            submitted,
            last_tid,
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketbench_ports::{FixedDelayDeliveryPort, ServicePorts, SimCustomerPort, SimSellerPort};
    use marketbench_ports::{Completion, DeliveryPort, PlatformConfig, SimulatedPlatform};
    use marketbench_types::{DistributionType, IdSampler, Interval, TransactionType};

    fn delivery_only(delay: Duration) -> (Arc<Dispatcher>, Arc<FixedDelayDeliveryPort>) {
        let platform = Arc::new(
            SimulatedPlatform::new(PlatformConfig::new(1, 1, 1).with_service_delay(Duration::ZERO))
                .unwrap(),
        );
        let delivery = Arc::new(FixedDelayDeliveryPort::new(delay));
        let ports = ServicePorts::new(
            Arc::new(SimSellerPort::new(Arc::clone(&platform), Completion::Synchronous)),
            Arc::new(SimCustomerPort::new(platform, Completion::Synchronous)),
            Arc::clone(&delivery) as Arc<dyn DeliveryPort>,
        );
        let sampler = IdSampler::new(Interval::new(1, 1), DistributionType::Uniform).unwrap();
        (Arc::new(Dispatcher::new(ports, sampler)), delivery)
    }

    fn delivery_mix() -> Arc<TransactionMix> {
        Arc::new(TransactionMix::new([(TransactionType::UpdateDelivery, 100)]).unwrap())
    }

    #[test]
    fn test_window_matches_execution_time() {
        for workers in [1, 4] {
            let (dispatcher, delivery) = delivery_only(Duration::from_millis(2));
            let strategy = OpenLoop::new(workers, Duration::from_millis(200), 11, CancellationFlag::new());

            let window = strategy.run(dispatcher, delivery_mix()).unwrap();

            let elapsed = (window.finish - window.start).num_milliseconds();
            assert!((200..400).contains(&elapsed), "elapsed {elapsed}ms");
            assert!(window.submitted > 0);
            assert_eq!(window.histogram.get(TransactionType::UpdateDelivery), window.submitted);

            // Every dispatched transaction finished before the workers joined.
            let finished = delivery.drain_finished();
            assert_eq!(finished.len() as u64, window.submitted);

            // Tids are unique per worker and sequence.
            let mut tids: Vec<_> = delivery.drain_submitted().into_iter().map(|s| s.tid).collect();
            tids.sort();
            tids.dedup();
            assert_eq!(tids.len() as u64, window.submitted);
        }
    }

    #[test]
    fn test_external_cancel_stops_early() {
        let (dispatcher, _) = delivery_only(Duration::from_millis(1));
        let cancel = CancellationFlag::new();
        let strategy = OpenLoop::new(2, Duration::from_secs(30), 1, cancel.clone());

        let handle = thread::spawn(move || strategy.run(dispatcher, delivery_mix()));
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();

        let window = handle.join().unwrap().unwrap();
        assert!((window.finish - window.start).num_seconds() < 5);
    }
}
