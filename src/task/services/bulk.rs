//! All-or-nothing status changes across several tasks.

use std::collections::HashSet;

use mockable::Clock;
use tracing::{error, info, instrument, warn};

use super::{ConcurrencyResolver, TaskMutationError, TaskMutationResult};
use crate::resilience::CallContext;
use crate::task::{
    domain::{Task, TaskDomainError, TaskId, TaskStatus},
    ports::TaskRepository,
};

const FETCH_OPERATION: &str = "task.get";
const COMMIT_OPERATION: &str = "task.bulk_update_status";
const ROLLBACK_OPERATION: &str = "task.bulk_rollback";

/// Moves a batch of tasks to one status, all or nothing.
///
/// The batch runs in two phases. The first validates every identifier,
/// fetches every task and checks every transition without writing. The
/// second writes each task through the [`ConcurrencyResolver`]. When a
/// write fails, the tasks already written are restored to the copies read
/// in the first phase before the failure is returned.
pub struct BulkMutationCoordinator<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    resolver: ConcurrencyResolver<R, C>,
}

impl<R, C> Clone for BulkMutationCoordinator<R, C>
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

impl<R, C> BulkMutationCoordinator<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a coordinator writing through `resolver`.
    #[must_use]
    pub const fn new(resolver: ConcurrencyResolver<R, C>) -> Self {
        Self { resolver }
    }

    /// Returns the resolver used for writes.
    #[must_use]
    pub const fn resolver(&self) -> &ConcurrencyResolver<R, C> {
        &self.resolver
    }

    /// Moves every task in `ids` to `status`.
    ///
    /// An empty batch succeeds without touching storage. Duplicate ids are
    /// collapsed, keeping first-seen order. Tasks already in `status` are
    /// left as they are. Returns the stored copies in batch order.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure (empty id, unknown status,
    /// unknown task, illegal transition) before any write happens. A write
    /// failure is returned after the batch's earlier writes have been
    /// undone; [`TaskMutationError::IncompleteRollback`] reports the tasks
    /// that could not be restored, including any another writer moved
    /// after the batch wrote them. Only status and position are reverted.
    #[instrument(
        name = "task.bulk_update_status",
        skip_all,
        fields(count = ids.len(), status = %status)
    )]
    pub async fn bulk_update_status<S>(
        &self,
        ctx: &CallContext,
        ids: &[S],
        status: &str,
    ) -> TaskMutationResult<Vec<Task>>
    where
        S: AsRef<str> + Sync,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let target = TaskStatus::try_from(status)?;
        let task_ids = dedupe(ids)?;
        let snapshots = self.load_and_validate(ctx, &task_ids, target).await?;

        let mut written: Vec<(&Task, Task)> = Vec::new();
        let mut stored = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            let result = self
                .resolver
                .compare_and_apply(ctx, COMMIT_OPERATION, snapshot.id(), |task, clock| {
                    task.transition_to(target, clock)
                })
                .await;
            match result {
                Ok(task) => {
                    if snapshot.status() != target {
                        written.push((snapshot, task.clone()));
                    }
                    stored.push(task);
                }
                Err(err) => return Err(self.roll_back(&written, err).await),
            }
        }

        info!(count = stored.len(), status = %target, "batch committed");
        Ok(stored)
    }

    async fn load_and_validate(
        &self,
        ctx: &CallContext,
        task_ids: &[TaskId],
        target: TaskStatus,
    ) -> TaskMutationResult<Vec<Task>> {
        let mut snapshots = Vec::with_capacity(task_ids.len());
        for id in task_ids {
            let task = self.resolver.fetch(ctx, FETCH_OPERATION, id).await?;
            let current = task.status();
            if current != target && !current.can_transition_to(target) {
                return Err(TaskMutationError::InvalidTransition {
                    task_id: id.clone(),
                    from: current,
                    to: target,
                });
            }
            snapshots.push(task);
        }
        Ok(snapshots)
    }

    /// Reverts the placement of each `(snapshot, written)` pair in reverse
    /// order under a fresh context, so a cancelled or expired batch still
    /// undoes its writes. A task another writer has moved since is left
    /// alone and reported as unrestored.
    async fn roll_back(
        &self,
        written: &[(&Task, Task)],
        cause: TaskMutationError,
    ) -> TaskMutationError {
        if written.is_empty() {
            return cause;
        }
        warn!(count = written.len(), error = %cause, "batch failed; restoring written tasks");

        let ctx = CallContext::new();
        let mut unrestored = Vec::new();
        for (snapshot, committed) in written.iter().rev() {
            let restored = self
                .resolver
                .compare_and_apply(&ctx, ROLLBACK_OPERATION, snapshot.id(), |task, clock| {
                    task.revert_placement(committed, snapshot, clock)
                })
                .await;
            let Err(err) = restored else {
                continue;
            };
            if let TaskMutationError::InvalidArgument(TaskDomainError::PlacementChanged {
                found,
                ..
            }) = &err
            {
                warn!(
                    task_id = %snapshot.id(),
                    status = %found,
                    "task moved since the batch wrote it; not restored"
                );
            } else {
                error!(task_id = %snapshot.id(), error = %err, "failed to restore task");
            }
            unrestored.push(snapshot.id().clone());
        }

        if unrestored.is_empty() {
            info!(count = written.len(), "batch rolled back");
            return cause;
        }
        TaskMutationError::IncompleteRollback {
            source: Box::new(cause),
            unrestored,
        }
    }
}

fn dedupe<S: AsRef<str>>(ids: &[S]) -> TaskMutationResult<Vec<TaskId>> {
    let mut seen = HashSet::with_capacity(ids.len());
    let mut unique = Vec::with_capacity(ids.len());
    for raw in ids {
        let id = TaskId::new(raw.as_ref())?;
        if seen.insert(id.clone()) {
            unique.push(id);
        }
    }
    Ok(unique)
}
