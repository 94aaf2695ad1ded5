//! Application services for workflow mutations.

mod bulk;
mod concurrency;
mod error;
mod mutation;

pub use bulk::BulkMutationCoordinator;
pub use concurrency::ConcurrencyResolver;
pub use error::{MutationErrorKind, TaskMutationError, TaskMutationResult};
pub use mutation::{MoveTaskRequest, TaskMutationEngine, UpdateStatusRequest};
