use marketbench_ports::PortError;
use marketbench_types::{SamplerError, TransactionType};
use thiserror::Error;

/// Errors raised while configuring or running the scheduler.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Cutoff {cutoff} for {tx_type} exceeds 100")]
    CutoffOutOfRange { tx_type: TransactionType, cutoff: u32 },

    #[error("Cutoff {cutoff} for {tx_type} is below the previous cutoff {previous}")]
    CutoffDecreasing {
        tx_type: TransactionType,
        cutoff: u32,
        previous: u32,
    },

    #[error("Transaction type {0} appears twice in the mix")]
    DuplicateType(TransactionType),

    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("Scheduler was not set up")]
    NotSetUp,

    #[error("Idle customer pool is closed")]
    PoolClosed,

    #[error("Id sampler: {0}")]
    Sampler(#[from] SamplerError),

    #[error("Port call failed: {0}")]
    Port(#[from] PortError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}
