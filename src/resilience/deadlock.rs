//! Short retry path for lock contention.
//!
//! Deadlocks and locked or busy databases usually clear within
//! milliseconds, so they get a small fixed attempt budget with a short
//! randomized delay instead of the general backoff schedule. Any other
//! error is handed straight back to the caller as
//! [`ResilienceError::Rejected`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CallContext, ResilienceError, Retryable};
use crate::config::{ConfigError, duration_millis};

/// Lock-contention retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeadlockRetryConfig {
    /// Attempts including the first.
    pub max_attempts: u32,
    /// Lower bound of the per-attempt randomized delay.
    #[serde(with = "duration_millis", rename = "min_delay_ms")]
    pub min_delay: Duration,
    /// Upper bound of the per-attempt randomized delay.
    #[serde(with = "duration_millis", rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for DeadlockRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(25),
        }
    }
}

impl DeadlockRetryConfig {
    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero attempt budget or an
    /// inverted delay range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "deadlock.max_attempts",
                "must be greater than 0",
            ));
        }
        if self.max_delay < self.min_delay {
            return Err(ConfigError::invalid(
                "deadlock.max_delay_ms",
                "must not be below deadlock.min_delay_ms",
            ));
        }
        Ok(())
    }

    /// Picks the delay before retry number `retry` (1-based): a uniform
    /// sample from `[min_delay, max_delay]` scaled by `retry`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let min = u64::try_from(self.min_delay.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let sampled = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_millis(sampled).saturating_mul(retry.max(1))
    }
}

/// Runs `operation_fn`, retrying lock-contention errors within the
/// contention budget.
///
/// # Errors
///
/// Returns [`ResilienceError::Rejected`] for the first error that is not
/// lock contention, [`ResilienceError::Exhausted`] once the contention
/// budget is spent, and [`ResilienceError::Cancelled`] or
/// [`ResilienceError::DeadlineExceeded`] when the context fires during a
/// backoff.
pub async fn execute_with_deadlock_retry<T, E, F, Fut>(
    ctx: &CallContext,
    config: &DeadlockRetryConfig,
    operation: &str,
    mut operation_fn: F,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + 'static,
{
    let mut attempt = 0_u32;
    loop {
        attempt += 1;
        let error = match operation_fn().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !error.is_lock_contention() {
            return Err(ResilienceError::Rejected {
                operation: operation.to_owned(),
                attempts: attempt,
                source: error,
            });
        }
        if attempt >= config.max_attempts {
            warn!(operation, attempts = attempt, error = %error, "lock contention persisted");
            return Err(ResilienceError::Exhausted {
                operation: operation.to_owned(),
                attempts: attempt,
                source: error,
            });
        }

        let delay = config.delay_for(attempt);
        debug!(
            operation,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "lock contention; retrying"
        );
        if let Err(interruption) = ctx.sleep(delay).await {
            return Err(ResilienceError::interrupted(
                interruption,
                operation,
                attempt,
                Some(error),
            ));
        }
    }
}
