//! Outcomes of a guarded call other than success.

use thiserror::Error;

use crate::persistence::StoreError;

/// Error returned by a guarded call.
///
/// Callers match on the variant to decide whether to retry, skip or escalate.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The breaker is open; the operation was not invoked.
    #[error("Circuit with id {id} is open")]
    Open { id: String },

    /// The operation failed with a qualifying error and the breaker was
    /// opened (or already had been opened by a concurrent caller).
    #[error("Circuit with id {id} tripped")]
    Tripped {
        id: String,
        #[source]
        cause: E,
    },

    /// The operation failed with a non-qualifying error, returned unchanged.
    #[error(transparent)]
    Operation(E),

    /// The breaker state could not be read or written.
    #[error("Circuit state for id {id} is unavailable: {source}")]
    Store {
        id: String,
        #[source]
        source: StoreError,
    },
}

impl<E> GuardError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, GuardError::Open { .. })
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self, GuardError::Tripped { .. })
    }

    /// Breaker id for breaker-related variants.
    pub fn breaker_id(&self) -> Option<&str> {
        match self {
            GuardError::Open { id } | GuardError::Tripped { id, .. } | GuardError::Store { id, .. } => {
                Some(id)
            }
            GuardError::Operation(_) => None,
        }
    }

    /// The operation's own error, if it ran and failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            GuardError::Tripped { cause, .. } => Some(cause),
            GuardError::Operation(e) => Some(e),
            GuardError::Open { .. } | GuardError::Store { .. } => None,
        }
    }
}
