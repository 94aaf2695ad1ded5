//! Re-read-before-write mutation of a single task.
//!
//! [`ConcurrencyResolver::compare_and_apply`] is the only path through which
//! the services write a task. Each attempt fetches a fresh copy, applies the
//! caller's mutation and saves the result, and the whole unit runs inside
//! the [`RetryExecutor`]. A writer that loses a race sees a revision
//! conflict, which is retryable, so its next attempt re-reads the winner's
//! copy and re-validates the mutation against it.

use std::sync::Arc;

use mockable::Clock;
use tracing::debug;

use super::error::{ApplyError, TaskMutationError, TaskMutationResult};
use crate::config::TaskflowConfig;
use crate::resilience::{
    CallContext, CircuitBreakerRegistry, DeadlockRetryConfig, RetryExecutor,
    execute_with_deadlock_retry,
};
use crate::task::{
    domain::{Mutation, Task, TaskDomainError, TaskFilter, TaskId},
    ports::TaskRepository,
};

/// Applies mutations to tasks with re-read-before-write semantics.
pub struct ConcurrencyResolver<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    retry: RetryExecutor,
    deadlock: DeadlockRetryConfig,
}

impl<R, C> Clone for ConcurrencyResolver<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
            retry: self.retry.clone(),
            deadlock: self.deadlock.clone(),
        }
    }
}

impl<R, C> ConcurrencyResolver<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a resolver with the default lock-contention policy.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>, retry: RetryExecutor) -> Self {
        Self {
            repository,
            clock,
            retry,
            deadlock: DeadlockRetryConfig::default(),
        }
    }

    /// Creates a resolver from a loaded configuration, gating calls with
    /// `breakers`.
    #[must_use]
    pub fn from_config(
        repository: Arc<R>,
        clock: Arc<C>,
        config: &TaskflowConfig,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        Self {
            repository,
            clock,
            retry: RetryExecutor::new(config.retry.clone(), breakers),
            deadlock: config.deadlock.clone(),
        }
    }

    /// Replaces the lock-contention policy used around saves.
    #[must_use]
    pub fn with_deadlock_retry(mut self, deadlock: DeadlockRetryConfig) -> Self {
        self.deadlock = deadlock;
        self
    }

    /// Returns the repository.
    #[must_use]
    pub const fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Returns the clock used to stamp mutations.
    #[must_use]
    pub const fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Returns the retry executor.
    #[must_use]
    pub const fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Fetches a fresh copy of a task, applies `mutate` and saves the result
    /// when the mutation reports [`Mutation::Changed`].
    ///
    /// Every attempt starts from a new read, so a retry never saves a copy
    /// that was mutated from stale state. A no-op mutation performs no
    /// write and returns the fetched copy.
    ///
    /// # Errors
    ///
    /// Returns the domain error produced by `mutate` unchanged in kind
    /// (never retried), [`TaskMutationError::NotFound`] for a missing task,
    /// and the retry, breaker or deadline failures of the executor.
    pub async fn compare_and_apply<F>(
        &self,
        ctx: &CallContext,
        operation: &str,
        id: &TaskId,
        mutate: F,
    ) -> TaskMutationResult<Task>
    where
        F: Fn(&mut Task, &C) -> Result<Mutation, TaskDomainError> + Send + Sync,
    {
        let mutate = &mutate;
        let outcome = self
            .retry
            .run(ctx, operation, move || {
                self.apply_once(ctx, operation, id, mutate)
            })
            .await
            .map_err(TaskMutationError::from_apply)?;

        debug!(
            operation,
            task_id = %id,
            attempts = outcome.attempts,
            revision = outcome.value.revision(),
            "mutation applied"
        );
        Ok(outcome.value)
    }

    /// Fetches a task through the retry executor.
    ///
    /// # Errors
    ///
    /// Returns [`TaskMutationError::NotFound`] for a missing task and the
    /// retry, breaker or deadline failures of the executor.
    pub async fn fetch(
        &self,
        ctx: &CallContext,
        operation: &str,
        id: &TaskId,
    ) -> TaskMutationResult<Task> {
        let repository = &*self.repository;
        self.retry
            .execute(ctx, operation, move || async move {
                repository.get(id).await.map_err(ApplyError::Repository)
            })
            .await
            .map_err(TaskMutationError::from_apply)
    }

    /// Lists tasks through the retry executor.
    ///
    /// # Errors
    ///
    /// Returns the retry, breaker or deadline failures of the executor.
    pub async fn list(
        &self,
        ctx: &CallContext,
        operation: &str,
        filter: &TaskFilter,
    ) -> TaskMutationResult<Vec<Task>> {
        let repository = &*self.repository;
        self.retry
            .execute(ctx, operation, move || async move {
                repository.list(filter).await.map_err(ApplyError::Repository)
            })
            .await
            .map_err(TaskMutationError::from_apply)
    }

    async fn apply_once<F>(
        &self,
        ctx: &CallContext,
        operation: &str,
        id: &TaskId,
        mutate: &F,
    ) -> Result<Task, ApplyError>
    where
        F: Fn(&mut Task, &C) -> Result<Mutation, TaskDomainError> + Send + Sync,
    {
        let mut task = self.repository.get(id).await.map_err(ApplyError::Repository)?;
        let mutation = mutate(&mut task, &*self.clock).map_err(ApplyError::Domain)?;
        if !mutation.is_changed() {
            debug!(operation, task_id = %id, "mutation is a no-op; skipping save");
            return Ok(task);
        }

        let repository = &*self.repository;
        let staged = &task;
        execute_with_deadlock_retry(ctx, &self.deadlock, operation, || repository.save(staged))
            .await
            .map_err(ApplyError::from_contention)
    }
}
