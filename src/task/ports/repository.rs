//! Repository port for task persistence.

use crate::resilience::{ErrorClass, Retryable};
use crate::task::domain::{Task, TaskFilter, TaskId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task persistence contract.
///
/// Adapters own the stored tasks; callers only ever hold transient copies.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Loads the current copy of a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn get(&self, id: &TaskId) -> TaskRepositoryResult<Task>;

    /// Inserts or replaces a task and returns the stored copy.
    ///
    /// Adapters that track revisions reject a save whose revision is stale
    /// with a [`StorageFaultKind::Conflict`] fault.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::ConstraintViolation`] or a tagged
    /// [`TaskRepositoryError::Fault`] when storage rejects the write.
    async fn save(&self, task: &Task) -> TaskRepositoryResult<Task>;

    /// Removes a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn delete(&self, id: &TaskId) -> TaskRepositoryResult<()>;

    /// Returns every task matching `filter`.
    async fn list(&self, filter: &TaskFilter) -> TaskRepositoryResult<Vec<Task>>;
}

/// Kind of a storage fault, tagged by the adapter that observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFaultKind {
    /// The storage call timed out.
    Timeout,
    /// The connection could not be established or was dropped.
    Connection,
    /// The row or table was locked by another writer.
    Locked,
    /// The storage engine detected a deadlock.
    Deadlock,
    /// The storage engine reported itself busy.
    Busy,
    /// Storage reported a temporary condition.
    Temporary,
    /// A network fault between the engine and storage.
    Network,
    /// A concurrent writer saved the task first.
    Conflict,
    /// Storage-side validation rejected the write.
    Validation,
    /// The caller is not authenticated to storage.
    Unauthorized,
    /// The caller may not perform the write.
    Forbidden,
}

impl StorageFaultKind {
    /// Returns the retry classification of this fault kind.
    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::Timeout
            | Self::Connection
            | Self::Locked
            | Self::Deadlock
            | Self::Busy
            | Self::Temporary
            | Self::Network
            | Self::Conflict => ErrorClass::Retryable,
            Self::Validation | Self::Unauthorized | Self::Forbidden => ErrorClass::Terminal,
        }
    }

    /// Returns `true` for lock contention handled by the short contention
    /// retry path.
    #[must_use]
    pub const fn is_lock_contention(self) -> bool {
        matches!(self, Self::Locked | Self::Deadlock | Self::Busy)
    }

    /// Returns a stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Locked => "locked",
            Self::Deadlock => "deadlock",
            Self::Busy => "busy",
            Self::Temporary => "temporary",
            Self::Network => "network",
            Self::Conflict => "conflict",
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for StorageFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A uniqueness, foreign key or not-null constraint rejected the write.
    #[error("constraint '{constraint}' violated: {message}")]
    ConstraintViolation {
        /// Name of the violated constraint.
        constraint: String,
        /// Storage-provided detail.
        message: String,
    },

    /// A tagged storage fault.
    #[error("storage fault ({kind}): {message}")]
    Fault {
        /// Fault classification.
        kind: StorageFaultKind,
        /// Storage-provided detail.
        message: String,
    },

    /// Unclassified persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps an unclassified persistence error.
    #[must_use]
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Creates a tagged storage fault.
    #[must_use]
    pub fn fault(kind: StorageFaultKind, message: impl Into<String>) -> Self {
        Self::Fault {
            kind,
            message: message.into(),
        }
    }

    /// Creates a constraint violation.
    #[must_use]
    pub fn constraint(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Tags a raw driver message at the adapter boundary.
    ///
    /// Constraint and permission failures are recognised first so that a
    /// message mentioning both a constraint and a timeout is never retried.
    /// Messages matching no known pattern become
    /// [`TaskRepositoryError::Persistence`], which is retried.
    #[must_use]
    pub fn from_driver_message(message: impl Into<String>) -> Self {
        let raw = message.into();
        let lowered = raw.to_ascii_lowercase();
        let contains_any = |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

        if contains_any(&["unique", "foreign key", "not null", "constraint"]) {
            let constraint = constraint_name(&lowered);
            return Self::ConstraintViolation {
                constraint,
                message: raw,
            };
        }

        let kind = if contains_any(&["unauthorized", "unauthorised"]) {
            Some(StorageFaultKind::Unauthorized)
        } else if contains_any(&["forbidden", "permission denied"]) {
            Some(StorageFaultKind::Forbidden)
        } else if contains_any(&["validation"]) {
            Some(StorageFaultKind::Validation)
        } else if contains_any(&["deadlock"]) {
            Some(StorageFaultKind::Deadlock)
        } else if contains_any(&["locked"]) {
            Some(StorageFaultKind::Locked)
        } else if contains_any(&["busy"]) {
            Some(StorageFaultKind::Busy)
        } else if contains_any(&["timeout", "timed out"]) {
            Some(StorageFaultKind::Timeout)
        } else if contains_any(&["connection"]) {
            Some(StorageFaultKind::Connection)
        } else if contains_any(&["network"]) {
            Some(StorageFaultKind::Network)
        } else if contains_any(&["temporary", "temporarily"]) {
            Some(StorageFaultKind::Temporary)
        } else {
            None
        };

        match kind {
            Some(fault_kind) => Self::fault(fault_kind, raw),
            None => Self::persistence(std::io::Error::other(raw)),
        }
    }

    /// Returns the fault kind for tagged faults.
    #[must_use]
    pub const fn fault_kind(&self) -> Option<StorageFaultKind> {
        match self {
            Self::Fault { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

fn constraint_name(lowered: &str) -> String {
    let name = if lowered.contains("unique") {
        "unique"
    } else if lowered.contains("foreign key") {
        "foreign_key"
    } else if lowered.contains("not null") {
        "not_null"
    } else {
        "constraint"
    };
    name.to_owned()
}

impl Retryable for TaskRepositoryError {
    fn error_class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) | Self::ConstraintViolation { .. } => ErrorClass::Terminal,
            Self::Fault { kind, .. } => kind.class(),
            Self::Persistence(_) => ErrorClass::Retryable,
        }
    }

    fn is_lock_contention(&self) -> bool {
        self.fault_kind()
            .is_some_and(StorageFaultKind::is_lock_contention)
    }

    fn is_dependency_failure(&self) -> bool {
        self.fault_kind() != Some(StorageFaultKind::Conflict)
    }
}
