//! Circuit breaker gating calls per operation class.
//!
//! A breaker counts consecutive retryable failures. Once the count reaches
//! the threshold the breaker opens and denies calls until the reset timeout
//! has elapsed since the last failure. The first caller after that becomes
//! a half-open probe: its success closes the breaker, its failure reopens
//! it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, duration_millis};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are denied.
    Open,
    /// A limited number of probe calls are admitted.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
            Self::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is admitted.
    #[serde(with = "duration_millis", rename = "reset_timeout_ms")]
    pub reset_timeout: Duration,
    /// Concurrent probes admitted while half-open.
    pub half_open_max_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero threshold, reset timeout
    /// or probe budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "must be greater than 0",
            ));
        }
        if self.reset_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "circuit_breaker.reset_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.half_open_max_probes == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.half_open_max_probes",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures recorded since the last success.
    pub failure_count: u32,
    /// Successes recorded over the breaker's lifetime.
    pub success_count: u64,
    /// Probes currently admitted while half-open.
    pub probes_in_flight: u32,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u64,
    last_failure: Option<Instant>,
    probes_in_flight: u32,
}

impl BreakerState {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            probes_in_flight: 0,
        }
    }
}

/// Thread-safe circuit breaker for one operation class.
#[derive(Debug)]
pub struct CircuitBreaker {
    operation: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(operation: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            operation: operation.into(),
            config,
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    /// Returns the operation class this breaker gates.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the breaker configuration.
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the current state without admitting a call.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Returns the current counters.
    #[must_use]
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.lock();
        CircuitBreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            probes_in_flight: inner.probes_in_flight,
        }
    }

    /// Asks to execute a call.
    ///
    /// Always admits while closed. While open, denies until the reset
    /// timeout has elapsed since the last failure, then moves to half-open
    /// and admits the caller as a probe. While half-open, admits callers
    /// until the probe budget is in flight.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .is_none_or(|at| at.elapsed() >= self.config.reset_timeout);
                if !cooled_down {
                    debug!(operation = %self.operation, "circuit breaker denied call");
                    return false;
                }
                inner.state = CircuitState::HalfOpen;
                inner.probes_in_flight = 1;
                info!(
                    operation = %self.operation,
                    state_transition = "open -> half-open",
                    "circuit breaker admitting probe"
                );
                true
            }
            CircuitState::HalfOpen => {
                if inner.probes_in_flight >= self.config.half_open_max_probes {
                    return false;
                }
                inner.probes_in_flight += 1;
                true
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = inner.success_count.saturating_add(1);
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.probes_in_flight = 0;
                inner.success_count = inner.success_count.saturating_add(1);
                info!(
                    operation = %self.operation,
                    state_transition = "half-open -> closed",
                    "circuit breaker closed after successful probe"
                );
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                debug!(operation = %self.operation, "success ignored while open");
            }
        }
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        operation = %self.operation,
                        state_transition = "closed -> open",
                        failure_count = inner.failure_count,
                        threshold = self.config.failure_threshold,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.probes_in_flight = 0;
                warn!(
                    operation = %self.operation,
                    state_transition = "half-open -> open",
                    "circuit breaker probe failed"
                );
            }
            CircuitState::Open => {
                inner.failure_count = inner.failure_count.saturating_add(1);
            }
        }
    }

    /// Releases a half-open probe slot whose call ended without an outcome
    /// (cancelled or timed out).
    pub fn abandon_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
    }

    /// Forces the breaker back to a fresh closed state.
    pub fn reset(&self) {
        *self.lock() = BreakerState::closed();
        info!(operation = %self.operation, "circuit breaker reset");
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide set of breakers keyed by operation class.
///
/// Breakers are created lazily on first use from the default configuration
/// or a per-class override, and shared by every caller of that class.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry using `default_config` for every class.
    #[must_use]
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Uses `config` for `operation` instead of the default.
    #[must_use]
    pub fn with_override(mut self, operation: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(operation.into(), config);
        self
    }

    /// Returns the shared breaker for `operation`, creating it if needed.
    #[must_use]
    pub fn breaker(&self, operation: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = breakers.get(operation) {
            return Arc::clone(existing);
        }
        let config = self
            .overrides
            .get(operation)
            .unwrap_or(&self.default_config)
            .clone();
        let created = Arc::new(CircuitBreaker::new(operation, config));
        breakers.insert(operation.to_owned(), Arc::clone(&created));
        created
    }

    /// Returns the state of every breaker created so far.
    #[must_use]
    pub fn states(&self) -> HashMap<String, CircuitState> {
        self.breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(operation, breaker)| (operation.clone(), breaker.state()))
            .collect()
    }

    /// Resets every breaker to closed.
    pub fn reset_all(&self) {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        for breaker in breakers.values() {
            breaker.reset();
        }
    }
}
