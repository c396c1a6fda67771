//! Retry behavior configuration.

use duration_str::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;

/// Retry behavior for retryable provider failures.
///
/// Delays follow exponential doubling from `base_delay`, capped at
/// `max_delay`, with jitter applied by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(deserialize_with = "deserialize_duration", default = "default_base_delay")]
    pub base_delay: Duration,

    /// Upper bound on any single retry delay.
    #[serde(deserialize_with = "deserialize_duration", default = "default_max_delay")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn retry_defaults() {
        let retry: RetryConfig = toml::from_str("").unwrap();

        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_millis(500));
        assert_eq!(retry.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn retry_custom_values() {
        let retry: RetryConfig = toml::from_str(indoc! {r#"
            max_attempts = 5
            base_delay = "250ms"
            max_delay = "30s"
        "#})
        .unwrap();

        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_secs(30));
    }
}
