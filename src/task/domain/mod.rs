//! Domain model for the task workflow.
//!
//! The task domain models kanban status columns, the legal transitions
//! between them, and the single-task mutations that the workflow services
//! apply, while keeping all infrastructure concerns outside of the domain
//! boundary.

mod error;
mod filter;
mod ids;
mod status;
mod task;

pub use error::{ParseTaskStatusError, TaskDomainError};
pub use filter::TaskFilter;
pub use ids::{Position, Progress, TaskId};
pub use status::{TaskStatus, is_valid_transition};
pub use task::{Mutation, PersistedTaskData, Task};
