use attribute_abi::{AttributeError, AttributeKey, ValueType};
use thiserror::Error;

/// Result alias for coupling operations.
pub type CouplingResult<T> = Result<T, CouplingError>;

/// Failures raised while creating or propagating couplings.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CouplingError {
    /// Producer and consumer declare different value types.
    #[error("cannot couple {producer} ({producer_type}) to {consumer} ({consumer_type})")]
    TypeMismatch {
        /// Producer side of the rejected binding.
        producer: AttributeKey,
        /// Producer value type.
        producer_type: ValueType,
        /// Consumer side of the rejected binding.
        consumer: AttributeKey,
        /// Consumer value type.
        consumer_type: ValueType,
    },

    /// An endpoint's backing state is gone.
    #[error("coupling endpoint {0} vanished")]
    Vanished(AttributeKey),

    /// No attribute matched a persisted reference.
    #[error("no attribute matches {0}")]
    UnresolvedAttribute(AttributeKey),

    /// The consumer rejected the propagated value.
    #[error(transparent)]
    Attribute(AttributeError),
}

impl From<AttributeError> for CouplingError {
    fn from(err: AttributeError) -> Self {
        match err {
            AttributeError::Vanished(key) => CouplingError::Vanished(key),
            other => CouplingError::Attribute(other),
        }
    }
}
