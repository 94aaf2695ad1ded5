//! Shared test helpers for in-memory integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use taskflow::{
    config::TaskflowConfig,
    resilience::CircuitBreakerRegistry,
    task::{
        adapters::memory::{FaultInjectingRepository, InMemoryTaskRepository},
        domain::{Position, Task, TaskId, TaskStatus},
        ports::{TaskRepository, TaskRepositoryError},
        services::{BulkMutationCoordinator, ConcurrencyResolver, TaskMutationEngine},
    },
};

/// Repository stack used by the integration tests.
pub type Repository = FaultInjectingRepository<InMemoryTaskRepository>;

/// Configuration with zero delays so that retries run instantly.
pub const FAST_CONFIG: &str = r#"{
    "retry": {"max_retries": 3, "base_delay_ms": 0, "max_delay_ms": 0},
    "circuit_breaker": {"failure_threshold": 50},
    "deadlock": {"max_attempts": 3, "min_delay_ms": 0, "max_delay_ms": 0}
}"#;

/// Services wired over one fault-injecting in-memory repository.
pub struct Board {
    pub repository: Arc<Repository>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub engine: TaskMutationEngine<Repository, DefaultClock>,
    pub coordinator: BulkMutationCoordinator<Repository, DefaultClock>,
}

impl Board {
    /// Wires the services from a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(document: &str) -> eyre::Result<Self> {
        let config = TaskflowConfig::from_json_str(document)?;
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
        let repository = Arc::new(FaultInjectingRepository::new(InMemoryTaskRepository::new()));
        let resolver = ConcurrencyResolver::from_config(
            Arc::clone(&repository),
            Arc::new(DefaultClock),
            &config,
            Arc::clone(&breakers),
        );

        Ok(Self {
            repository,
            breakers,
            engine: TaskMutationEngine::new(resolver.clone()),
            coordinator: BulkMutationCoordinator::new(resolver),
        })
    }

    /// Stores a task in `status` at `position`, bypassing fault injection.
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be built or stored.
    pub async fn seed(&self, id: &str, status: TaskStatus, position: u64) -> eyre::Result<Task> {
        let task = Task::new(TaskId::new(id)?, format!("Task {id}"), &DefaultClock)?
            .with_placement(status, Position::from(position));
        Ok(self.repository.inner().save(&task).await?)
    }

    /// Reads the stored copy of a task, bypassing fault injection.
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be read.
    pub async fn stored(&self, id: &str) -> Result<Task, TaskRepositoryError> {
        let task_id = TaskId::new(id).map_err(TaskRepositoryError::persistence)?;
        self.repository.inner().get(&task_id).await
    }
}

/// Provides a board wired with zero-delay retries.
#[fixture]
pub fn board() -> Board {
    Board::from_config(FAST_CONFIG).expect("fast configuration is valid")
}
