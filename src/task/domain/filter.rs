//! Query filter for listing tasks.

use super::{Task, TaskId, TaskStatus};

/// Conjunctive filter over task fields. An empty filter matches every task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    status: Option<TaskStatus>,
    assignee: Option<String>,
    parent: Option<TaskId>,
}

impl TaskFilter {
    /// Creates a filter matching every task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to one status column.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts the filter to one assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Restricts the filter to subtasks of `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Returns the status restriction, if any.
    #[must_use]
    pub const fn status(&self) -> Option<TaskStatus> {
        self.status
    }

    /// Returns `true` when `task` satisfies every restriction.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let status_matches = self.status.is_none_or(|status| task.status() == status);
        let assignee_matches = self
            .assignee
            .as_deref()
            .is_none_or(|assignee| task.assignee() == Some(assignee));
        let parent_matches = self
            .parent
            .as_ref()
            .is_none_or(|parent| task.parent() == Some(parent));
        status_matches && assignee_matches && parent_matches
    }
}
