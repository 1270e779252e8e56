//! Error types for port calls.

use marketbench_types::TransactionType;
use std::error::Error;
use thiserror::Error;

/// Errors raised by a port while executing a transaction.
#[derive(Debug, Error)]
pub enum PortError {
    /// The request never got a response (connection reset, timeout, ...).
    #[error("Transport failure: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync + 'static>),

    /// The platform answered with a non-success response.
    #[error("Request rejected by {component}: {reason}")]
    Rejected {
        component: &'static str,
        reason: String,
    },

    /// The port does not serve this transaction type.
    #[error("Transaction type {0} is not served by this port")]
    Unsupported(TransactionType),

    /// The id does not exist on the platform.
    #[error("Unknown {kind} id {id}")]
    UnknownId { kind: &'static str, id: u32 },
}

impl PortError {
    /// Wrap a transport-level error.
    pub fn transport<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        PortError::Transport(Box::new(error))
    }

    /// Whether this error comes from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, PortError::Transport(_))
    }

    /// Innermost error of the source chain.
    ///
    /// Transport errors usually wrap the interesting failure a few levels
    /// deep; other variants are their own root cause.
    pub fn root_cause(&self) -> &(dyn Error + 'static) {
        let mut cause: &(dyn Error + 'static) = self;
        while let Some(next) = cause.source() {
            cause = next;
        }
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::io;

    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_root_cause_unwraps_transport_chain() {
        let err = PortError::transport(Wrapped(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )));

        assert!(err.is_transport());
        assert_eq!(err.root_cause().to_string(), "connection reset by peer");
    }

    #[test]
    fn test_root_cause_of_leaf_error_is_itself() {
        let err = PortError::Rejected {
            component: "cart",
            reason: "409 Conflict".into(),
        };

        assert!(!err.is_transport());
        assert_eq!(
            err.root_cause().to_string(),
            "Request rejected by cart: 409 Conflict"
        );
    }
}
