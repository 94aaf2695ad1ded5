//! Task aggregate root and its workflow mutations.

use super::{Position, Progress, TaskDomainError, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of applying a mutation to a task.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The task changed and must be persisted.
    Changed,
    /// The request was an idempotent no-op; nothing needs persisting.
    Unchanged,
}

impl Mutation {
    /// Returns `true` when the task must be written back.
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    status: TaskStatus,
    position: Position,
    progress: Progress,
    assignee: Option<String>,
    parent: Option<TaskId>,
    dependencies: BTreeSet<TaskId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    revision: u64,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: String,
    /// Persisted status column.
    pub status: TaskStatus,
    /// Persisted position within the column.
    pub position: Position,
    /// Persisted completion percentage.
    pub progress: Progress,
    /// Persisted assignee, if any.
    pub assignee: Option<String>,
    /// Persisted parent task, if any.
    pub parent: Option<TaskId>,
    /// Persisted dependency set.
    pub dependencies: BTreeSet<TaskId>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted storage revision.
    pub revision: u64,
}

impl Task {
    /// Creates a new backlog task at the top of its column.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank.
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        let raw_title = title.into();
        let normalized = raw_title.trim();
        if normalized.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let timestamp = clock.utc();

        Ok(Self {
            id,
            title: normalized.to_owned(),
            status: TaskStatus::Backlog,
            position: Position::TOP,
            progress: Progress::NONE,
            assignee: None,
            parent: None,
            dependencies: BTreeSet::new(),
            created_at: timestamp,
            updated_at: timestamp,
            revision: 0,
        })
    }

    /// Places a freshly created task in the given column without consulting
    /// the transition table (seeding and imports).
    #[must_use]
    pub fn with_placement(mut self, status: TaskStatus, position: Position) -> Self {
        self.status = status;
        self.position = position;
        self
    }

    /// Sets the initial progress.
    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Sets the parent task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::SelfReference`] when `parent` is this task.
    pub fn with_parent(mut self, parent: TaskId) -> Result<Self, TaskDomainError> {
        if parent == self.id {
            return Err(TaskDomainError::SelfReference(parent));
        }
        self.parent = Some(parent);
        Ok(self)
    }

    /// Adds a dependency on another task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::SelfReference`] when `dependency` is this
    /// task.
    pub fn with_dependency(mut self, dependency: TaskId) -> Result<Self, TaskDomainError> {
        if dependency == self.id {
            return Err(TaskDomainError::SelfReference(dependency));
        }
        self.dependencies.insert(dependency);
        Ok(self)
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            status: data.status,
            position: data.position,
            progress: data.progress,
            assignee: data.assignee,
            parent: data.parent,
            dependencies: data.dependencies,
            created_at: data.created_at,
            updated_at: data.updated_at,
            revision: data.revision,
        }
    }

    /// Decomposes the task into its persisted representation.
    #[must_use]
    pub fn into_persisted(self) -> PersistedTaskData {
        PersistedTaskData {
            id: self.id,
            title: self.title,
            status: self.status,
            position: self.position,
            progress: self.progress,
            assignee: self.assignee,
            parent: self.parent,
            dependencies: self.dependencies,
            created_at: self.created_at,
            updated_at: self.updated_at,
            revision: self.revision,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the current status column.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the position within the status column.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Returns the completion percentage.
    #[must_use]
    pub const fn progress(&self) -> Progress {
        self.progress
    }

    /// Returns the assignee, if any.
    #[must_use]
    pub fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    /// Returns the parent task, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<&TaskId> {
        self.parent.as_ref()
    }

    /// Returns the tasks this task depends on.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<TaskId> {
        &self.dependencies
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the storage revision this copy was read at.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Moves the task to `target` within its current position.
    ///
    /// Requesting the current status is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when the transition is
    /// not in the legal table. The task is left untouched.
    pub fn transition_to(
        &mut self,
        target: TaskStatus,
        clock: &impl Clock,
    ) -> Result<Mutation, TaskDomainError> {
        self.move_to(target, self.position, clock)
    }

    /// Moves the task to `target` at `position`.
    ///
    /// A same-status request only repositions the task; a same-status,
    /// same-position request is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] when the status change
    /// is not in the legal table. The task is left untouched.
    pub fn move_to(
        &mut self,
        target: TaskStatus,
        position: Position,
        clock: &impl Clock,
    ) -> Result<Mutation, TaskDomainError> {
        if target == self.status {
            if position == self.position {
                return Ok(Mutation::Unchanged);
            }
            self.position = position;
            self.touch(clock);
            return Ok(Mutation::Changed);
        }

        if !self.status.can_transition_to(target) {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id.clone(),
                from: self.status,
                to: target,
            });
        }

        self.status = target;
        self.position = position;
        self.touch(clock);
        Ok(Mutation::Changed)
    }

    /// Replaces the completion percentage.
    pub fn set_progress(&mut self, progress: Progress, clock: &impl Clock) -> Mutation {
        if progress == self.progress {
            return Mutation::Unchanged;
        }
        self.progress = progress;
        self.touch(clock);
        Mutation::Changed
    }

    /// Puts the status and position of `snapshot` back, provided the task
    /// still holds the placement recorded in `written`. Progress and every
    /// other field keep their current values.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::PlacementChanged`] when the status or
    /// position no longer match `written`. The task is left untouched.
    pub fn revert_placement(
        &mut self,
        written: &Self,
        snapshot: &Self,
        clock: &impl Clock,
    ) -> Result<Mutation, TaskDomainError> {
        if self.status != written.status || self.position != written.position {
            return Err(TaskDomainError::PlacementChanged {
                task_id: self.id.clone(),
                expected: written.status,
                found: self.status,
            });
        }
        if self.status == snapshot.status && self.position == snapshot.position {
            return Ok(Mutation::Unchanged);
        }
        self.status = snapshot.status;
        self.position = snapshot.position;
        self.touch(clock);
        Ok(Mutation::Changed)
    }

    /// Updates the `updated_at` timestamp, never moving it before
    /// `created_at`.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc().max(self.created_at);
    }
}
