//! Shared world state for task workflow BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use taskflow::{
    resilience::{CircuitBreakerRegistry, RetryConfig, RetryExecutor},
    task::{
        adapters::memory::InMemoryTaskRepository,
        domain::Task,
        services::{
            BulkMutationCoordinator, ConcurrencyResolver, TaskMutationEngine, TaskMutationError,
        },
    },
};

/// Engine type used by the BDD world.
pub type TestEngine = TaskMutationEngine<InMemoryTaskRepository, DefaultClock>;

/// Batch coordinator type used by the BDD world.
pub type TestCoordinator = BulkMutationCoordinator<InMemoryTaskRepository, DefaultClock>;

/// Scenario world for task workflow behaviour tests.
pub struct TaskWorkflowWorld {
    pub repository: Arc<InMemoryTaskRepository>,
    pub engine: TestEngine,
    pub coordinator: TestCoordinator,
    pub last_move_result: Option<Result<Task, TaskMutationError>>,
    pub last_batch_result: Option<Result<Vec<Task>, TaskMutationError>>,
}

impl TaskWorkflowWorld {
    /// Creates a world over an empty repository.
    #[must_use]
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryTaskRepository::new());
        let retry = RetryExecutor::new(
            RetryConfig::immediate(3),
            Arc::new(CircuitBreakerRegistry::default()),
        );
        let resolver =
            ConcurrencyResolver::new(Arc::clone(&repository), Arc::new(DefaultClock), retry);

        Self {
            repository,
            engine: TaskMutationEngine::new(resolver.clone()),
            coordinator: BulkMutationCoordinator::new(resolver),
            last_move_result: None,
            last_batch_result: None,
        }
    }
}

impl Default for TaskWorkflowWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> TaskWorkflowWorld {
    TaskWorkflowWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
