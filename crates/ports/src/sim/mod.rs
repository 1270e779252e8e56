//! Simulated platform and the ports that drive it.

mod completion;
mod customer;
mod delivery;
mod platform;
mod seller;

pub use completion::{Completion, CompletionPump};
pub use customer::SimCustomerPort;
pub use delivery::{FixedDelayDeliveryPort, SimDeliveryPort};
pub use platform::{PlatformConfig, SimulatedPlatform};
pub use seller::SimSellerPort;

use crate::error::PortError;
use crate::log::TransactionLog;
use marketbench_types::TransactionMark;
use std::hash::Hash;
use tracing::debug;

/// Turn a failed platform call into the port's outcome.
///
/// Rejections become abort marks and the call succeeds. Transport failures
/// are marked too but still surface. Anything else is a caller error.
fn settle_failure<K: Eq + Hash>(
    log: &TransactionLog<K>,
    completion: &Completion,
    mark: TransactionMark,
    error: PortError,
) -> Result<(), PortError> {
    completion.release();
    match error {
        PortError::Rejected { .. } => {
            debug!(
                tid = %mark.tid,
                tx_type = %mark.tx_type,
                component = %mark.component,
                "Transaction aborted"
            );
            log.record_abort(mark);
            Ok(())
        }
        PortError::Transport(_) => {
            log.record_abort(mark);
            Err(error)
        }
        other => Err(other),
    }
}
