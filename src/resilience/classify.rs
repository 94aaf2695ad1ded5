//! Retryable versus terminal classification of operation errors.

/// Whether an error is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A transient failure expected to succeed after a delay.
    Retryable,
    /// A failure that repeats deterministically; never retried.
    Terminal,
}

/// Errors that can be routed through the retry executors.
///
/// The classification is decided where the error is produced (for storage
/// errors, by the adapter that tags a [`StorageFaultKind`]). The default
/// classification is [`ErrorClass::Retryable`]: unknown failures favour
/// availability over fast failure.
///
/// [`StorageFaultKind`]: crate::task::ports::StorageFaultKind
pub trait Retryable: std::error::Error {
    /// Classifies this error.
    fn error_class(&self) -> ErrorClass {
        ErrorClass::Retryable
    }

    /// Returns `true` when this error should be retried.
    fn is_retryable(&self) -> bool {
        self.error_class() == ErrorClass::Retryable
    }

    /// Returns `true` for lock contention (deadlocks, locked or busy
    /// databases) that the short contention retry path handles.
    fn is_lock_contention(&self) -> bool {
        false
    }

    /// Returns `true` when a retryable occurrence of this error counts as
    /// a failure of the dependency behind the circuit breaker. Contention
    /// between callers, such as a stale-revision conflict, does not.
    fn is_dependency_failure(&self) -> bool {
        true
    }
}
