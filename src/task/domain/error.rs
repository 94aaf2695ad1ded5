//! Error types for task domain validation and parsing.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task identifier is empty after trimming.
    #[error("task identifier must not be empty")]
    EmptyIdentifier,

    /// A column position was negative.
    #[error("position must be non-negative, got {0}")]
    NegativePosition(i64),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task would become its own parent or dependency.
    #[error("task {0} cannot reference itself")]
    SelfReference(TaskId),

    /// The requested status transition is not in the legal table.
    #[error("invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// The task being transitioned.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// Another writer changed the task's placement after it was read.
    #[error("task {task_id} was moved by another writer: expected {expected}, found {found}")]
    PlacementChanged {
        /// The task whose placement changed.
        task_id: TaskId,
        /// Status the caller expected to find.
        expected: TaskStatus,
        /// Status actually found.
        found: TaskStatus,
    },
}

/// Error returned while parsing task statuses from requests or persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
