use super::{settle_failure, Completion, SimulatedPlatform};
use crate::error::PortError;
use crate::log::TransactionLog;
use crate::signal::CompletionSignal;
use crate::traits::DeliveryPort;
use chrono::Utc;
use marketbench_types::{Tid, TransactionIdentifier, TransactionMark, TransactionOutput, TransactionType};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Delivery transactions all come from the one delivery worker.
const DELIVERY_SOURCE_ID: u32 = 1;

/// Delivery port backed by the simulated platform.
#[derive(Debug)]
pub struct SimDeliveryPort {
    platform: Arc<SimulatedPlatform>,
    log: Arc<TransactionLog<()>>,
    completion: Completion,
}

impl SimDeliveryPort {
    pub fn new(platform: Arc<SimulatedPlatform>, completion: Completion) -> Self {
        Self {
            platform,
            log: Arc::new(TransactionLog::new()),
            completion,
        }
    }
}

impl DeliveryPort for SimDeliveryPort {
    fn run(&self, tid: &Tid) -> Result<(), PortError> {
        self.log.record_submitted(
            (),
            TransactionIdentifier::new(tid.clone(), TransactionType::UpdateDelivery, Utc::now()),
        );

        match self.platform.update_delivery() {
            Ok(()) => {
                let log = Arc::clone(&self.log);
                let tid = tid.clone();
                self.completion
                    .finish(move |at| log.record_finished((), TransactionOutput::new(tid, at)));
                Ok(())
            }
            Err(e) => settle_failure(
                &self.log,
                &self.completion,
                TransactionMark::abort(
                    tid.clone(),
                    TransactionType::UpdateDelivery,
                    DELIVERY_SOURCE_ID,
                    "shipment",
                ),
                e,
            ),
        }
    }

    fn drain_submitted(&self) -> Vec<TransactionIdentifier> {
        self.log.drain_submitted(&())
    }

    fn drain_finished(&self) -> Vec<TransactionOutput> {
        self.log.drain_finished(&())
    }

    fn drain_aborted(&self) -> Vec<TransactionMark> {
        self.log.drain_aborted()
    }
}

/// Delivery port with a constant service time and no platform behind it.
///
/// Every call sleeps for `delay`, records the transaction as finished and,
/// when given a signal, announces the completion itself.
#[derive(Debug)]
pub struct FixedDelayDeliveryPort {
    delay: Duration,
    log: TransactionLog<()>,
    signal: Option<CompletionSignal>,
}

impl FixedDelayDeliveryPort {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            log: TransactionLog::new(),
            signal: None,
        }
    }

    /// Announce each completion on `signal`.
    pub fn with_signal(mut self, signal: CompletionSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

impl DeliveryPort for FixedDelayDeliveryPort {
    fn run(&self, tid: &Tid) -> Result<(), PortError> {
        self.log.record_submitted(
            (),
            TransactionIdentifier::new(tid.clone(), TransactionType::UpdateDelivery, Utc::now()),
        );
        thread::sleep(self.delay);
        self.log
            .record_finished((), TransactionOutput::new(tid.clone(), Utc::now()));
        if let Some(signal) = &self.signal {
            signal.notify();
        }
        Ok(())
    }

    fn drain_submitted(&self) -> Vec<TransactionIdentifier> {
        self.log.drain_submitted(&())
    }

    fn drain_finished(&self) -> Vec<TransactionOutput> {
        self.log.drain_finished(&())
    }

    fn drain_aborted(&self) -> Vec<TransactionMark> {
        self.log.drain_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CompletionPump, PlatformConfig};

    #[test]
    fn test_fixed_delay_port_signals_each_completion() {
        let signal = CompletionSignal::new();
        let port = FixedDelayDeliveryPort::new(Duration::from_millis(5)).with_signal(signal.clone());

        port.run(&Tid::from("0-1")).unwrap();
        port.run(&Tid::from("0-2")).unwrap();

        assert_eq!(signal.pending(), 2);
        let submitted = port.drain_submitted();
        let finished = port.drain_finished();
        assert_eq!(submitted.len(), 2);
        assert_eq!(finished.len(), 2);
        assert!(
            (finished[0].completed_at - submitted[0].submitted_at).num_milliseconds() >= 5
        );
    }

    #[test]
    fn test_asynchronous_delivery_finishes_after_quiesce() {
        let platform = SimulatedPlatform::new(
            PlatformConfig::new(1, 1, 1).with_service_delay(Duration::ZERO),
        )
        .unwrap();
        let signal = CompletionSignal::new();
        let pump = Arc::new(CompletionPump::spawn(Duration::from_millis(10), signal.clone()).unwrap());
        let port = SimDeliveryPort::new(Arc::new(platform), Completion::Asynchronous(Arc::clone(&pump)));

        port.run(&Tid::from("0-1")).unwrap();
        assert!(pump.quiesce(Duration::from_secs(5)));

        assert_eq!(port.drain_finished().len(), 1);
        assert_eq!(signal.pending(), 1);
    }

    #[test]
    fn test_rejected_shipment_marked() {
        let platform = SimulatedPlatform::new(
            PlatformConfig::new(1, 1, 1)
                .with_service_delay(Duration::ZERO)
                .with_abort_probability(1.0),
        )
        .unwrap();
        let port = SimDeliveryPort::new(Arc::new(platform), Completion::Synchronous);

        port.run(&Tid::from("0-1")).unwrap();
        let aborts = port.drain_aborted();
        assert_eq!(aborts.len(), 1);
        assert_eq!(aborts[0].component, "shipment");
        assert_eq!(aborts[0].source_id, DELIVERY_SOURCE_ID);
    }
}
