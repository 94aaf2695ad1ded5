//! In-memory adapters for the task repository port.

mod faults;
mod task;

pub use faults::FaultInjectingRepository;
pub use task::InMemoryTaskRepository;
