//! Resilience controls for persistence calls.
//!
//! - [`RetryExecutor`]: bounded retry with exponential (or linear) backoff
//!   and retryable/terminal classification via [`Retryable`]
//! - [`CircuitBreaker`] and [`CircuitBreakerRegistry`]: per operation class
//!   failure gating
//! - [`execute_with_deadlock_retry`]: short randomized retry for lock
//!   contention
//! - [`CallContext`]: cancellation and deadlines for every call

mod cancellation;
mod circuit_breaker;
mod classify;
mod deadlock;
mod error;
mod retry;

pub use cancellation::{CallContext, Interruption};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerSnapshot,
    CircuitState,
};
pub use classify::{ErrorClass, Retryable};
pub use deadlock::{DeadlockRetryConfig, execute_with_deadlock_retry};
pub use error::ResilienceError;
pub use retry::{BackoffStrategy, RetryConfig, RetryExecutor, RetryOutcome};

#[cfg(test)]
mod tests;
