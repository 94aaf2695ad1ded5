//! In-memory repository for the task workflow.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{Task, TaskFilter, TaskId},
    ports::{StorageFaultKind, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository with revision checking.
///
/// Every successful save bumps the stored revision. Saving a copy whose
/// revision differs from the stored one fails with a retryable
/// [`StorageFaultKind::Conflict`] fault, so a writer holding a stale copy
/// must re-read before it can write.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Every write is a single map operation, so a poisoned lock still
    // guards a consistent map.
    fn read_state(&self) -> RwLockReadGuard<'_, HashMap<TaskId, Task>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, Task>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Panics on another thread while holding the write lock. Returns
    /// `true` once the lock is poisoned.
    #[cfg(test)]
    pub(crate) fn poison(&self) -> bool {
        let state = Arc::clone(&self.state);
        let panicked = std::thread::spawn(move || {
            let _guard = state.write();
            panic!("writer panicked while holding the task store");
        })
        .join()
        .is_err();
        panicked && self.state.is_poisoned()
    }
}

fn with_revision(task: &Task, revision: u64) -> Task {
    let mut data = task.clone().into_persisted();
    data.revision = revision;
    Task::from_persisted(data)
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn get(&self, id: &TaskId) -> TaskRepositoryResult<Task> {
        let state = self.read_state();
        state
            .get(id)
            .cloned()
            .ok_or_else(|| TaskRepositoryError::NotFound(id.clone()))
    }

    async fn save(&self, task: &Task) -> TaskRepositoryResult<Task> {
        let mut state = self.write_state();
        let next_revision = match state.get(task.id()) {
            Some(stored) if stored.revision() != task.revision() => {
                return Err(TaskRepositoryError::fault(
                    StorageFaultKind::Conflict,
                    format!(
                        "stale revision for task {}: stored {}, given {}",
                        task.id(),
                        stored.revision(),
                        task.revision()
                    ),
                ));
            }
            Some(stored) => stored.revision().saturating_add(1),
            None => task.revision().saturating_add(1),
        };

        let persisted = with_revision(task, next_revision);
        state.insert(task.id().clone(), persisted.clone());
        Ok(persisted)
    }

    async fn delete(&self, id: &TaskId) -> TaskRepositoryResult<()> {
        let mut state = self.write_state();
        state
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TaskRepositoryError::NotFound(id.clone()))
    }

    async fn list(&self, filter: &TaskFilter) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read_state();
        let mut tasks: Vec<Task> = state
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        tasks.sort_by(|left, right| {
            (left.status(), left.position(), left.id())
                .cmp(&(right.status(), right.position(), right.id()))
        });
        Ok(tasks)
    }
}
