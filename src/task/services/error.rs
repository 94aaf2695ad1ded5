//! Service-level errors for workflow mutations.

use crate::resilience::{ErrorClass, Interruption, ResilienceError, Retryable};
use crate::task::{
    domain::{ParseTaskStatusError, TaskDomainError, TaskId, TaskStatus},
    ports::{StorageFaultKind, TaskRepositoryError},
};
use thiserror::Error;

/// Result type for workflow service operations.
pub type TaskMutationResult<T> = Result<T, TaskMutationError>;

/// Coarse category of a [`TaskMutationError`], telling callers whether to
/// fix their input or retry later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationErrorKind {
    /// Malformed input; never retried.
    InvalidArgument,
    /// Transition not in the legal table; never retried.
    InvalidTransition,
    /// The task does not exist; never retried.
    NotFound,
    /// Storage constraint rejected the write; never retried.
    ConstraintViolation,
    /// Transient storage failure that outlived the retry budget.
    Retryable,
    /// Storage rejected the call for a reason retrying cannot fix.
    Rejected,
    /// The breaker for the operation class is open.
    CircuitOpen,
    /// The call deadline elapsed or the call was cancelled.
    Timeout,
    /// A batch failed and could not be fully rolled back.
    IncompleteRollback,
}

/// Service-level errors for workflow mutations.
#[derive(Debug, Error)]
pub enum TaskMutationError {
    /// A request argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[source] TaskDomainError),

    /// A requested status string is not a known status.
    #[error("invalid argument: {0}")]
    InvalidStatus(#[from] ParseTaskStatusError),

    /// The transition is not in the legal table.
    #[error("invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// The task being transitioned.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A storage constraint rejected the write.
    #[error("constraint '{constraint}' violated: {message}")]
    ConstraintViolation {
        /// Name of the violated constraint.
        constraint: String,
        /// Storage-provided detail.
        message: String,
    },

    /// Storage kept failing, or refused the call outright.
    #[error("operation '{operation}' failed after {attempts} attempt(s): {source}")]
    Storage {
        /// Operation class.
        operation: String,
        /// Attempts made.
        attempts: u32,
        /// Last storage error.
        #[source]
        source: TaskRepositoryError,
    },

    /// The breaker for the operation class is open.
    #[error("circuit breaker open for operation '{operation}'")]
    CircuitOpen {
        /// Operation class that was denied.
        operation: String,
    },

    /// The call deadline elapsed.
    #[error("operation '{operation}' timed out after {attempts} attempt(s)")]
    Timeout {
        /// Operation class.
        operation: String,
        /// Attempts started.
        attempts: u32,
    },

    /// The call was cancelled.
    #[error("operation '{operation}' cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Operation class.
        operation: String,
        /// Attempts started.
        attempts: u32,
    },

    /// A batch failed and some members could not be restored.
    #[error("batch failed and {count} task(s) could not be restored: {source}", count = .unrestored.len())]
    IncompleteRollback {
        /// The failure that aborted the batch.
        #[source]
        source: Box<TaskMutationError>,
        /// Tasks left with the batch's status.
        unrestored: Vec<TaskId>,
    },
}

impl TaskMutationError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> MutationErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::InvalidStatus(_) => MutationErrorKind::InvalidArgument,
            Self::InvalidTransition { .. } => MutationErrorKind::InvalidTransition,
            Self::NotFound(_) => MutationErrorKind::NotFound,
            Self::ConstraintViolation { .. } => MutationErrorKind::ConstraintViolation,
            Self::Storage { source, .. } => match source.error_class() {
                ErrorClass::Retryable => MutationErrorKind::Retryable,
                ErrorClass::Terminal => MutationErrorKind::Rejected,
            },
            Self::CircuitOpen { .. } => MutationErrorKind::CircuitOpen,
            Self::Timeout { .. } | Self::Cancelled { .. } => MutationErrorKind::Timeout,
            Self::IncompleteRollback { .. } => MutationErrorKind::IncompleteRollback,
        }
    }

    /// Returns `true` when the same request may succeed later.
    #[must_use]
    pub fn is_retry_later(&self) -> bool {
        matches!(
            self.kind(),
            MutationErrorKind::Retryable | MutationErrorKind::CircuitOpen | MutationErrorKind::Timeout
        )
    }

    /// Returns `true` when the request itself must change before it can
    /// succeed.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            MutationErrorKind::InvalidArgument
                | MutationErrorKind::InvalidTransition
                | MutationErrorKind::NotFound
                | MutationErrorKind::ConstraintViolation
        )
    }
}

impl From<TaskDomainError> for TaskMutationError {
    fn from(err: TaskDomainError) -> Self {
        match err {
            TaskDomainError::InvalidTransition { task_id, from, to } => {
                Self::InvalidTransition { task_id, from, to }
            }
            other => Self::InvalidArgument(other),
        }
    }
}

/// Failure of one fetch-apply-save unit inside the retry executor.
#[derive(Debug, Error)]
pub(crate) enum ApplyError {
    /// The mutation was rejected by the domain.
    #[error(transparent)]
    Domain(TaskDomainError),
    /// The repository call failed.
    #[error(transparent)]
    Repository(TaskRepositoryError),
    /// The call context fired inside the unit.
    #[error("call interrupted: {0:?}")]
    Interrupted(Interruption),
}

impl ApplyError {
    /// Unwraps the outcome of the contention retry around a save.
    pub(crate) fn from_contention(err: ResilienceError<TaskRepositoryError>) -> Self {
        match err {
            ResilienceError::Cancelled { .. } => Self::Interrupted(Interruption::Cancelled),
            ResilienceError::DeadlineExceeded { .. } => {
                Self::Interrupted(Interruption::DeadlineExceeded)
            }
            ResilienceError::Exhausted { source, .. } | ResilienceError::Rejected { source, .. } => {
                Self::Repository(source)
            }
            // The contention path consults no breaker.
            ResilienceError::CircuitOpen { operation } => Self::Repository(TaskRepositoryError::fault(
                StorageFaultKind::Temporary,
                format!("circuit breaker open for operation '{operation}'"),
            )),
        }
    }
}

impl Retryable for ApplyError {
    fn error_class(&self) -> ErrorClass {
        match self {
            Self::Domain(_) | Self::Interrupted(_) => ErrorClass::Terminal,
            Self::Repository(err) => err.error_class(),
        }
    }

    fn is_lock_contention(&self) -> bool {
        match self {
            Self::Domain(_) | Self::Interrupted(_) => false,
            Self::Repository(err) => err.is_lock_contention(),
        }
    }

    fn is_dependency_failure(&self) -> bool {
        match self {
            Self::Domain(_) | Self::Interrupted(_) => false,
            Self::Repository(err) => err.is_dependency_failure(),
        }
    }
}

impl TaskMutationError {
    /// Maps a repository failure, keeping not-found and constraint errors
    /// distinct from retry-later storage failures.
    pub(crate) fn from_repository(
        operation: String,
        attempts: u32,
        err: TaskRepositoryError,
    ) -> Self {
        match err {
            TaskRepositoryError::NotFound(id) => Self::NotFound(id),
            TaskRepositoryError::ConstraintViolation {
                constraint,
                message,
            } => Self::ConstraintViolation {
                constraint,
                message,
            },
            other => Self::Storage {
                operation,
                attempts,
                source: other,
            },
        }
    }

    /// Maps the final outcome of a retried unit onto the service taxonomy.
    pub(crate) fn from_apply(err: ResilienceError<ApplyError>) -> Self {
        match err {
            ResilienceError::CircuitOpen { operation } => Self::CircuitOpen { operation },
            ResilienceError::Exhausted {
                operation,
                attempts,
                source,
            }
            | ResilienceError::Rejected {
                operation,
                attempts,
                source,
            } => match source {
                ApplyError::Domain(domain) => Self::from(domain),
                ApplyError::Repository(repository) => {
                    Self::from_repository(operation, attempts, repository)
                }
                ApplyError::Interrupted(Interruption::Cancelled) => Self::Cancelled {
                    operation,
                    attempts,
                },
                ApplyError::Interrupted(Interruption::DeadlineExceeded) => Self::Timeout {
                    operation,
                    attempts,
                },
            },
            ResilienceError::Cancelled {
                operation,
                attempts,
                ..
            } => Self::Cancelled {
                operation,
                attempts,
            },
            ResilienceError::DeadlineExceeded {
                operation,
                attempts,
                ..
            } => Self::Timeout {
                operation,
                attempts,
            },
        }
    }
}
