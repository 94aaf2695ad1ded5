//! Single-task workflow mutations: moving across the board and progress.

use mockable::Clock;
use tracing::{debug, instrument};

use super::{ConcurrencyResolver, TaskMutationResult};
use crate::resilience::CallContext;
use crate::task::{
    domain::{Position, Progress, Task, TaskFilter, TaskId, TaskStatus},
    ports::TaskRepository,
};

/// Request payload for moving a task to a status column and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTaskRequest {
    task_id: String,
    status: String,
    position: i64,
}

impl MoveTaskRequest {
    /// Creates a move request from raw caller input.
    #[must_use]
    pub fn new(task_id: impl Into<String>, status: impl Into<String>, position: i64) -> Self {
        Self {
            task_id: task_id.into(),
            status: status.into(),
            position,
        }
    }
}

/// Request payload for changing a task's status in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatusRequest {
    task_id: String,
    status: String,
}

impl UpdateStatusRequest {
    /// Creates a status update request from raw caller input.
    #[must_use]
    pub fn new(task_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: status.into(),
        }
    }
}

/// Validates and applies single-task workflow mutations.
///
/// Arguments are validated before any storage call, so a malformed request
/// never reaches the repository. Everything past validation goes through
/// [`ConcurrencyResolver::compare_and_apply`].
pub struct TaskMutationEngine<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    resolver: ConcurrencyResolver<R, C>,
}

impl<R, C> Clone for TaskMutationEngine<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<R, C> TaskMutationEngine<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates an engine writing through `resolver`.
    #[must_use]
    pub const fn new(resolver: ConcurrencyResolver<R, C>) -> Self {
        Self { resolver }
    }

    /// Returns the resolver used for writes.
    #[must_use]
    pub const fn resolver(&self) -> &ConcurrencyResolver<R, C> {
        &self.resolver
    }

    /// Moves a task to the requested status and position.
    ///
    /// Validation runs in a fixed order: position, then status, then
    /// identifier. A request naming the task's current status and position
    /// succeeds without writing.
    ///
    /// # Errors
    ///
    /// Returns [`TaskMutationError::InvalidArgument`] or
    /// [`TaskMutationError::InvalidStatus`] for malformed input,
    /// [`TaskMutationError::NotFound`] for an unknown task,
    /// [`TaskMutationError::InvalidTransition`] for an illegal move, and
    /// the storage failures of the resolver.
    ///
    /// [`TaskMutationError::InvalidArgument`]: super::TaskMutationError::InvalidArgument
    /// [`TaskMutationError::InvalidStatus`]: super::TaskMutationError::InvalidStatus
    /// [`TaskMutationError::NotFound`]: super::TaskMutationError::NotFound
    /// [`TaskMutationError::InvalidTransition`]: super::TaskMutationError::InvalidTransition
    #[instrument(
        name = "task.move",
        skip_all,
        fields(task_id = %request.task_id, status = %request.status, position = request.position)
    )]
    pub async fn move_task(
        &self,
        ctx: &CallContext,
        request: MoveTaskRequest,
    ) -> TaskMutationResult<Task> {
        let position = Position::new(request.position)?;
        let target = TaskStatus::try_from(request.status.as_str())?;
        let id = TaskId::new(request.task_id)?;

        self.resolver
            .compare_and_apply(ctx, "task.move", &id, |task, clock| {
                task.move_to(target, position, clock)
            })
            .await
    }

    /// Changes a task's status, keeping its position.
    ///
    /// # Errors
    ///
    /// Same as [`TaskMutationEngine::move_task`], minus position validation.
    #[instrument(
        name = "task.update_status",
        skip_all,
        fields(task_id = %request.task_id, status = %request.status)
    )]
    pub async fn update_status(
        &self,
        ctx: &CallContext,
        request: UpdateStatusRequest,
    ) -> TaskMutationResult<Task> {
        let target = TaskStatus::try_from(request.status.as_str())?;
        let id = TaskId::new(request.task_id)?;

        self.resolver
            .compare_and_apply(ctx, "task.update_status", &id, |task, clock| {
                task.transition_to(target, clock)
            })
            .await
    }

    /// Sets a task's progress, clamping the value into `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error for an empty identifier,
    /// not-found for an unknown task, and the storage failures of the
    /// resolver.
    #[instrument(name = "task.update_progress", skip_all, fields(task_id = %task_id, progress = progress))]
    pub async fn update_progress(
        &self,
        ctx: &CallContext,
        task_id: &str,
        progress: i64,
    ) -> TaskMutationResult<Task> {
        let id = TaskId::new(task_id)?;
        let clamped = Progress::clamped(progress);
        if i64::from(clamped.value()) != progress {
            debug!(requested = progress, clamped = clamped.value(), "progress clamped");
        }

        self.resolver
            .compare_and_apply(ctx, "task.update_progress", &id, |task, clock| {
                Ok(task.set_progress(clamped, clock))
            })
            .await
    }

    /// Adds `delta` to a task's current progress, clamping the result into
    /// `0..=100`. The delta is applied to the copy read on each attempt.
    ///
    /// # Errors
    ///
    /// Same as [`TaskMutationEngine::update_progress`].
    #[instrument(name = "task.adjust_progress", skip_all, fields(task_id = %task_id, delta = delta))]
    pub async fn adjust_progress(
        &self,
        ctx: &CallContext,
        task_id: &str,
        delta: i64,
    ) -> TaskMutationResult<Task> {
        let id = TaskId::new(task_id)?;

        self.resolver
            .compare_and_apply(ctx, "task.update_progress", &id, |task, clock| {
                let adjusted = task.progress().adjusted(delta);
                Ok(task.set_progress(adjusted, clock))
            })
            .await
    }

    /// Returns the tasks in one status column, ordered by position then id.
    ///
    /// # Errors
    ///
    /// Returns the storage failures of the resolver.
    #[instrument(name = "task.list", skip_all, fields(status = %status))]
    pub async fn board_column(
        &self,
        ctx: &CallContext,
        status: TaskStatus,
    ) -> TaskMutationResult<Vec<Task>> {
        let filter = TaskFilter::new().with_status(status);
        let mut tasks = self.resolver.list(ctx, "task.list", &filter).await?;
        tasks.sort_by(|left, right| {
            (left.position(), left.id()).cmp(&(right.position(), right.id()))
        });
        Ok(tasks)
    }
}
