//! Errors surfaced by the retry executors.

use super::Interruption;
use thiserror::Error;

/// Final failure of an operation routed through a
/// [`RetryExecutor`](super::RetryExecutor).
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    /// The circuit breaker for the operation class denied the call.
    #[error("circuit breaker open for operation '{operation}'")]
    CircuitOpen {
        /// Operation class that was denied.
        operation: String,
    },

    /// Every attempt failed with a retryable error.
    #[error("operation '{operation}' failed after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Operation class.
        operation: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// Error of the last attempt.
        #[source]
        source: E,
    },

    /// An attempt failed with an error the executor does not retry: a
    /// terminal error, or anything but lock contention on the contention
    /// path.
    #[error("operation '{operation}' failed with a non-retryable error: {source}")]
    Rejected {
        /// Operation class.
        operation: String,
        /// Attempts made, including the failing one.
        attempts: u32,
        /// The terminal error, unchanged.
        #[source]
        source: E,
    },

    /// The call context was cancelled.
    #[error("operation '{operation}' cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Operation class.
        operation: String,
        /// Attempts started before cancellation.
        attempts: u32,
        /// Error of the last completed attempt, if any.
        #[source]
        last_error: Option<E>,
    },

    /// The call context deadline elapsed.
    #[error("operation '{operation}' exceeded its deadline after {attempts} attempt(s)")]
    DeadlineExceeded {
        /// Operation class.
        operation: String,
        /// Attempts started before the deadline.
        attempts: u32,
        /// Error of the last completed attempt, if any.
        #[source]
        last_error: Option<E>,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    pub(crate) fn interrupted(
        interruption: Interruption,
        operation: &str,
        attempts: u32,
        last_error: Option<E>,
    ) -> Self {
        let operation = operation.to_owned();
        match interruption {
            Interruption::Cancelled => Self::Cancelled {
                operation,
                attempts,
                last_error,
            },
            Interruption::DeadlineExceeded => Self::DeadlineExceeded {
                operation,
                attempts,
                last_error,
            },
        }
    }

    /// Returns the operation class the error refers to.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::CircuitOpen { operation }
            | Self::Exhausted { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::Cancelled { operation, .. }
            | Self::DeadlineExceeded { operation, .. } => operation,
        }
    }

    /// Returns how many attempts were started. A denied call made none.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen { .. } => 0,
            Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. }
            | Self::Cancelled { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    /// Returns the underlying operation error, if one was observed.
    #[must_use]
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::Exhausted { source, .. } | Self::Rejected { source, .. } => Some(source),
            Self::Cancelled { last_error, .. } | Self::DeadlineExceeded { last_error, .. } => {
                last_error
            }
        }
    }
}
