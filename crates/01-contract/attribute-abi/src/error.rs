use thiserror::Error;

use crate::value::{AttributeKey, ContainerId, ValueType};

/// Result alias for attribute access and component registration.
pub type AttributeResult<T> = Result<T, AttributeError>;

/// Failures surfaced when touching a producer or consumer, or when a
/// component's containers clash with ones already registered.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AttributeError {
    /// The state backing the attribute has been dropped.
    #[error("attribute {0} no longer exists")]
    Vanished(AttributeKey),

    /// A value of the wrong type was handed to a consumer.
    #[error("value written to {key} is not a {expected}")]
    WrongType {
        /// Consumer that rejected the value.
        key: AttributeKey,
        /// Type the consumer accepts.
        expected: ValueType,
    },

    /// Another registered component already exposes a container with this id.
    #[error("container {0} is already exposed by a registered component")]
    DuplicateContainer(ContainerId),
}
