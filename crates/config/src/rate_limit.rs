//! Rate limiting configuration structures.

use duration_str::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;

/// Rate limits applied to one platform, keyed by calling credential.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformRateLimits {
    /// Request admissions per interval.
    pub requests: Option<RateLimitQuota>,
    /// Token admissions per interval.
    pub tokens: Option<RateLimitQuota>,
}

/// Configuration for a rate limit quota.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitQuota {
    /// Maximum number of units allowed within the interval.
    pub limit: u32,
    /// Time window for the rate limit.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

impl Default for RateLimitQuota {
    fn default() -> Self {
        Self {
            limit: 60,
            interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn quota_parses_human_durations() {
        let config = indoc! {r#"
            [requests]
            limit = 500
            interval = "60s"

            [tokens]
            limit = 100000
            interval = "1m"
        "#};

        let limits: PlatformRateLimits = toml::from_str(config).unwrap();

        let requests = limits.requests.unwrap();
        assert_eq!(requests.limit, 500);
        assert_eq!(requests.interval, Duration::from_secs(60));

        let tokens = limits.tokens.unwrap();
        assert_eq!(tokens.limit, 100_000);
        assert_eq!(tokens.interval, Duration::from_secs(60));
    }

    #[test]
    fn limits_default_to_unset() {
        let limits: PlatformRateLimits = toml::from_str("").unwrap();
        assert!(limits.requests.is_none());
        assert!(limits.tokens.is_none());
    }
}
