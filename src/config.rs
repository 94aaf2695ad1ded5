//! Engine configuration.
//!
//! [`TaskflowConfig`] gathers the resilience settings used by the workflow
//! services. Every section has sensible defaults, so a configuration
//! document only needs to name the values it overrides.
//!
//! # Examples
//!
//! ```
//! use taskflow::config::TaskflowConfig;
//!
//! let config = TaskflowConfig::from_json_str(r#"{"retry": {"max_retries": 5}}"#)
//!     .expect("valid configuration");
//! assert_eq!(config.retry.max_retries, 5);
//! assert_eq!(config.circuit_breaker.failure_threshold, 5);
//! ```

use crate::resilience::{CircuitBreakerConfig, DeadlockRetryConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level configuration for the workflow engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskflowConfig {
    /// General retry policy for persistence calls.
    pub retry: RetryConfig,
    /// Breaker settings applied to every operation class.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Short retry path for lock contention.
    pub deadlock: DeadlockRetryConfig,
}

impl TaskflowConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields,
    /// and [`ConfigError::Invalid`] when a value fails validation.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.deadlock.validate()
    }
}

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Offending field path.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) const fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}

/// Serialises [`Duration`](std::time::Duration) values as integer
/// milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
