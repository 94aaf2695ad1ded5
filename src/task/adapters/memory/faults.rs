//! Repository decorator that injects scripted storage faults.
//!
//! Wraps another [`TaskRepository`] and fails selected calls before they
//! reach it, so the retry, breaker and rollback paths can be driven
//! deterministically. It also counts calls per operation.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::task::{
    domain::{Task, TaskFilter, TaskId},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

#[derive(Debug, Default)]
struct FaultPlan {
    gets: VecDeque<TaskRepositoryError>,
    saves: VecDeque<TaskRepositoryError>,
    saves_by_id: HashMap<TaskId, VecDeque<TaskRepositoryError>>,
    lists: VecDeque<TaskRepositoryError>,
}

#[derive(Debug, Default)]
struct CallCounters {
    gets: AtomicUsize,
    saves: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

/// Decorator injecting queued faults ahead of an inner repository.
#[derive(Debug, Default)]
pub struct FaultInjectingRepository<R> {
    inner: R,
    plan: Mutex<FaultPlan>,
    calls: CallCounters,
}

impl<R> FaultInjectingRepository<R>
where
    R: TaskRepository,
{
    /// Wraps `inner` with an empty fault plan.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            plan: Mutex::new(FaultPlan::default()),
            calls: CallCounters::default(),
        }
    }

    /// Returns the wrapped repository.
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.inner
    }

    /// Fails the next `get` calls with `errors`, in order.
    pub fn fail_next_gets(&self, errors: impl IntoIterator<Item = TaskRepositoryError>) {
        self.plan().gets.extend(errors);
    }

    /// Fails the next `save` calls with `errors`, in order.
    pub fn fail_next_saves(&self, errors: impl IntoIterator<Item = TaskRepositoryError>) {
        self.plan().saves.extend(errors);
    }

    /// Fails the next `save` calls for `id` with `errors`, in order. Saves of
    /// other tasks are unaffected.
    pub fn fail_saves_for(
        &self,
        id: &TaskId,
        errors: impl IntoIterator<Item = TaskRepositoryError>,
    ) {
        self.plan()
            .saves_by_id
            .entry(id.clone())
            .or_default()
            .extend(errors);
    }

    /// Fails the next `list` calls with `errors`, in order.
    pub fn fail_next_lists(&self, errors: impl IntoIterator<Item = TaskRepositoryError>) {
        self.plan().lists.extend(errors);
    }

    /// Returns how many `get` calls were received, failed ones included.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.calls.gets.load(Ordering::SeqCst)
    }

    /// Returns how many `save` calls were received, failed ones included.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.calls.saves.load(Ordering::SeqCst)
    }

    /// Returns how many `delete` calls were received.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.calls.deletes.load(Ordering::SeqCst)
    }

    /// Returns how many `list` calls were received, failed ones included.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.calls.lists.load(Ordering::SeqCst)
    }

    fn plan(&self) -> MutexGuard<'_, FaultPlan> {
        self.plan.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_save_fault(&self, id: &TaskId) -> Option<TaskRepositoryError> {
        let mut plan = self.plan();
        let scoped = plan
            .saves_by_id
            .get_mut(id)
            .and_then(VecDeque::pop_front);
        scoped.or_else(|| plan.saves.pop_front())
    }
}

#[async_trait]
impl<R> TaskRepository for FaultInjectingRepository<R>
where
    R: TaskRepository,
{
    async fn get(&self, id: &TaskId) -> TaskRepositoryResult<Task> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        let fault = self.plan().gets.pop_front();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.get(id).await
    }

    async fn save(&self, task: &Task) -> TaskRepositoryResult<Task> {
        self.calls.saves.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_save_fault(task.id()) {
            return Err(err);
        }
        self.inner.save(task).await
    }

    async fn delete(&self, id: &TaskId) -> TaskRepositoryResult<()> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }

    async fn list(&self, filter: &TaskFilter) -> TaskRepositoryResult<Vec<Task>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        let fault = self.plan().lists.pop_front();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.list(filter).await
    }
}
