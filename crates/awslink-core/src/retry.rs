//! Retry policy selection.
//!
//! This module only chooses a policy; retries are executed by the SDK client
//! using the [`RetryConfig`] produced by [`RetryPolicy::to_retry_config`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use aws_config::retry::RetryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectionError, ConnectionResult};

/// SDK default number of attempts (initial request included).
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// SDK default initial backoff.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// SDK default maximum backoff.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(20);

/// Named retry strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Exponential backoff with jitter.
    Standard,
    /// Standard backoff plus client-side rate limiting.
    Adaptive,
    /// A single attempt, no retries.
    Disabled,
}

impl FromStr for RetryStrategy {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "adaptive" => Ok(Self::Adaptive),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(ConnectionError::Configuration(format!(
                "unknown retry strategy '{other}'; expected one of standard, adaptive, disabled"
            ))),
        }
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::Adaptive => "adaptive",
            Self::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Resolved retry/backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// The SDK's built-in standard policy.
    #[must_use]
    pub fn sdk_default() -> Self {
        Self {
            strategy: RetryStrategy::Standard,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Strategy in use.
    #[must_use]
    pub fn strategy(&self) -> RetryStrategy {
        self.strategy
    }

    /// Maximum attempts including the initial request.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the first retry.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Upper bound on backoff between retries.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Convert into the SDK retry configuration.
    #[must_use]
    pub fn to_retry_config(&self) -> RetryConfig {
        let base = match self.strategy {
            RetryStrategy::Disabled => return RetryConfig::disabled(),
            RetryStrategy::Standard => RetryConfig::standard(),
            RetryStrategy::Adaptive => RetryConfig::adaptive(),
        };
        base.with_max_attempts(self.max_attempts)
            .with_initial_backoff(self.initial_backoff)
            .with_max_backoff(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::sdk_default()
    }
}

/// Selects the retry policy a connection hands to its client.
///
/// Deserializes from `{"type": "default"}` or
/// `{"type": "pluggable", "strategy": "adaptive", "maxAttempts": 5}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RetryPolicyFactory {
    /// The SDK default policy.
    #[default]
    Default,
    /// A named strategy with optional overrides.
    Pluggable(PluggableRetryPolicy),
}

impl RetryPolicyFactory {
    /// Build the retry policy.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Configuration`] for an unknown strategy name
    /// or inconsistent parameters.
    pub fn build(&self) -> ConnectionResult<RetryPolicy> {
        match self {
            Self::Default => Ok(RetryPolicy::sdk_default()),
            Self::Pluggable(pluggable) => pluggable.build(),
        }
    }
}

/// A retry strategy chosen by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluggableRetryPolicy {
    /// Strategy name: `standard`, `adaptive`, `disabled` (or `none`).
    pub strategy: String,
    /// Maximum attempts including the initial request.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Initial backoff in milliseconds.
    #[serde(default)]
    pub initial_backoff_ms: Option<u64>,
    /// Maximum backoff in milliseconds.
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

impl PluggableRetryPolicy {
    /// A pluggable policy using the named strategy and SDK default parameters.
    pub fn named(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            max_attempts: None,
            initial_backoff_ms: None,
            max_backoff_ms: None,
        }
    }

    /// Override the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    fn build(&self) -> ConnectionResult<RetryPolicy> {
        let strategy: RetryStrategy = self.strategy.parse()?;
        if strategy == RetryStrategy::Disabled {
            return Ok(RetryPolicy {
                strategy,
                max_attempts: 1,
                ..RetryPolicy::sdk_default()
            });
        }

        let max_attempts = self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConnectionError::Configuration(
                "retry maxAttempts must be at least 1".to_owned(),
            ));
        }
        let initial_backoff = self
            .initial_backoff_ms
            .map_or(DEFAULT_INITIAL_BACKOFF, Duration::from_millis);
        let max_backoff = self
            .max_backoff_ms
            .map_or(DEFAULT_MAX_BACKOFF, Duration::from_millis);
        if initial_backoff > max_backoff {
            return Err(ConnectionError::Configuration(format!(
                "retry initial backoff ({}ms) exceeds max backoff ({}ms)",
                initial_backoff.as_millis(),
                max_backoff.as_millis()
            )));
        }

        Ok(RetryPolicy {
            strategy,
            max_attempts,
            initial_backoff,
            max_backoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use aws_config::retry::RetryMode;

    use super::*;

    #[test]
    fn test_should_build_sdk_default_policy() {
        let policy = RetryPolicyFactory::Default.build().unwrap();
        assert_eq!(policy, RetryPolicy::sdk_default());
        assert_eq!(policy.max_attempts(), 3);

        let config = policy.to_retry_config();
        assert_eq!(config.mode(), RetryMode::Standard);
        assert_eq!(config.max_attempts(), 3);
    }

    #[test]
    fn test_should_build_named_adaptive_policy() {
        let factory = RetryPolicyFactory::Pluggable(
            PluggableRetryPolicy::named("Adaptive").with_max_attempts(7),
        );
        let policy = factory.build().unwrap();
        assert_eq!(policy.strategy(), RetryStrategy::Adaptive);
        assert_eq!(policy.max_attempts(), 7);
        assert_eq!(policy.to_retry_config().mode(), RetryMode::Adaptive);
    }

    #[test]
    fn test_should_disable_retries() {
        let factory = RetryPolicyFactory::Pluggable(PluggableRetryPolicy::named("none"));
        let policy = factory.build().unwrap();
        assert_eq!(policy.strategy(), RetryStrategy::Disabled);
        assert_eq!(policy.to_retry_config().max_attempts(), 1);
    }

    #[test]
    fn test_should_reject_unknown_strategy() {
        let factory = RetryPolicyFactory::Pluggable(PluggableRetryPolicy::named("fibonacci"));
        let err = factory.build().unwrap_err();
        assert!(matches!(err, ConnectionError::Configuration(ref m) if m.contains("fibonacci")));
    }

    #[test]
    fn test_should_reject_zero_attempts() {
        let factory = RetryPolicyFactory::Pluggable(
            PluggableRetryPolicy::named("standard").with_max_attempts(0),
        );
        assert!(factory.build().is_err());
    }

    #[test]
    fn test_should_reject_inverted_backoff_bounds() {
        let factory = RetryPolicyFactory::Pluggable(PluggableRetryPolicy {
            strategy: "standard".to_owned(),
            max_attempts: None,
            initial_backoff_ms: Some(5_000),
            max_backoff_ms: Some(100),
        });
        assert!(factory.build().is_err());
    }

    #[test]
    fn test_should_deserialize_pluggable_policy() {
        let factory: RetryPolicyFactory = serde_json::from_str(
            r#"{"type": "pluggable", "strategy": "standard", "maxAttempts": 5, "initialBackoffMs": 50}"#,
        )
        .unwrap();
        let policy = factory.build().unwrap();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.initial_backoff(), Duration::from_millis(50));
        assert_eq!(policy.max_backoff(), DEFAULT_MAX_BACKOFF);
    }
}
