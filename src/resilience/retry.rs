//! Bounded retry with backoff, gated by a per-operation circuit breaker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CallContext, CircuitBreakerRegistry, ErrorClass, ResilienceError, Retryable};
use crate::config::{ConfigError, duration_millis};

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base_delay * 2^(retry - 1)`: base, 2x base, 4x base, ...
    #[default]
    Exponential,
    /// `base_delay * retry`: base, 2x base, 3x base, ...
    Linear,
}

impl BackoffStrategy {
    /// Returns the delay before retry number `retry` (1-based), capped at
    /// `max_delay`.
    #[must_use]
    pub fn delay(self, base_delay: Duration, max_delay: Duration, retry: u32) -> Duration {
        let factor = match self {
            Self::Exponential => 1_u32
                .checked_shl(retry.saturating_sub(1))
                .unwrap_or(u32::MAX),
            Self::Linear => retry.max(1),
        };
        base_delay.saturating_mul(factor).min(max_delay)
    }
}

/// General retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(with = "duration_millis", rename = "base_delay_ms")]
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    #[serde(with = "duration_millis", rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Growth of the delay between retries.
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff: BackoffStrategy::Exponential,
        }
    }
}

impl RetryConfig {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// A policy that retries `max_retries` times without waiting.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: BackoffStrategy::Exponential,
        }
    }

    /// Returns the delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff.delay(self.base_delay, self.max_delay, retry)
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_delay` is below
    /// `base_delay`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_delay < self.base_delay {
            return Err(ConfigError::invalid(
                "retry.max_delay_ms",
                "must not be below retry.base_delay_ms",
            ));
        }
        Ok(())
    }
}

/// Bookkeeping for one [`RetryExecutor`] call: attempts started, the last
/// retryable error, and the delays slept so far. Discarded once the call
/// resolves.
#[derive(Debug)]
struct RetryContext<E> {
    attempts: u32,
    last_error: Option<E>,
    schedule: Vec<Duration>,
}

impl<E> RetryContext<E> {
    const fn new() -> Self {
        Self {
            attempts: 0,
            last_error: None,
            schedule: Vec::new(),
        }
    }
}

/// Successful result of a [`RetryExecutor`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// Value produced by the successful attempt.
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Delays slept between attempts.
    pub backoff_schedule: Vec<Duration>,
}

/// Runs fallible operations with bounded retry.
///
/// Before each attempt the breaker of the operation class is consulted; a
/// denial fails the call with [`ResilienceError::CircuitOpen`] without
/// consuming an attempt. Terminal errors are returned after one attempt.
/// Retryable errors are retried up to [`RetryConfig::max_retries`] times.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl RetryExecutor {
    /// Creates an executor using `breakers` to gate calls.
    #[must_use]
    pub const fn new(config: RetryConfig, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self { config, breakers }
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the breaker registry.
    #[must_use]
    pub const fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Runs `operation_fn` and returns only its value.
    ///
    /// # Errors
    ///
    /// See [`RetryExecutor::run`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        ctx: &CallContext,
        operation: &str,
        operation_fn: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + 'static,
    {
        self.run(ctx, operation, operation_fn)
            .await
            .map(|outcome| outcome.value)
    }

    /// Runs `operation_fn` with retry and reports how many attempts it took.
    ///
    /// # Errors
    ///
    /// Returns [`ResilienceError::CircuitOpen`] when the breaker denies an
    /// attempt, [`ResilienceError::Rejected`] for a terminal error,
    /// [`ResilienceError::Exhausted`] when the retry budget runs out, and
    /// [`ResilienceError::Cancelled`] or
    /// [`ResilienceError::DeadlineExceeded`] when the context fires.
    pub async fn run<T, E, F, Fut>(
        &self,
        ctx: &CallContext,
        operation: &str,
        mut operation_fn: F,
    ) -> Result<RetryOutcome<T>, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + 'static,
    {
        let breaker = self.breakers.breaker(operation);
        let mut context = RetryContext::new();

        loop {
            if let Err(interruption) = ctx.check() {
                return Err(ResilienceError::interrupted(
                    interruption,
                    operation,
                    context.attempts,
                    context.last_error,
                ));
            }
            if !breaker.can_execute() {
                warn!(
                    operation,
                    attempts = context.attempts,
                    "circuit breaker open; call denied"
                );
                return Err(ResilienceError::CircuitOpen {
                    operation: operation.to_owned(),
                });
            }

            context.attempts += 1;
            debug!(operation, attempt = context.attempts, "starting attempt");
            let result = match ctx.run(operation_fn()).await {
                Ok(result) => result,
                Err(interruption) => {
                    breaker.abandon_probe();
                    return Err(ResilienceError::interrupted(
                        interruption,
                        operation,
                        context.attempts,
                        context.last_error,
                    ));
                }
            };

            let error = match result {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(RetryOutcome {
                        value,
                        attempts: context.attempts,
                        backoff_schedule: context.schedule,
                    });
                }
                Err(error) => error,
            };

            // A failure observed after the context fired reports the
            // interruption, not the error it provoked.
            if let Err(interruption) = ctx.check() {
                breaker.abandon_probe();
                return Err(ResilienceError::interrupted(
                    interruption,
                    operation,
                    context.attempts,
                    Some(error),
                ));
            }

            if error.error_class() == ErrorClass::Terminal {
                // The dependency answered; only the request was bad.
                breaker.record_success();
                debug!(operation, attempt = context.attempts, error = %error, "terminal error");
                return Err(ResilienceError::Rejected {
                    operation: operation.to_owned(),
                    attempts: context.attempts,
                    source: error,
                });
            }

            if error.is_dependency_failure() {
                breaker.record_failure();
            } else {
                breaker.record_success();
            }
            if context.attempts > self.config.max_retries {
                warn!(
                    operation,
                    attempts = context.attempts,
                    error = %error,
                    "retry budget exhausted"
                );
                return Err(ResilienceError::Exhausted {
                    operation: operation.to_owned(),
                    attempts: context.attempts,
                    source: error,
                });
            }

            let delay = self.config.delay_for(context.attempts);
            warn!(
                operation,
                attempt = context.attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retryable error; backing off"
            );
            context.last_error = Some(error);
            context.schedule.push(delay);
            if let Err(interruption) = ctx.sleep(delay).await {
                return Err(ResilienceError::interrupted(
                    interruption,
                    operation,
                    context.attempts,
                    context.last_error,
                ));
            }
        }
    }
}
