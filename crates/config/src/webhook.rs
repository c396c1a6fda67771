//! Webhook endpoint configuration.

use std::time::Duration;

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// A webhook endpoint notified about monitoring events.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Destination URL for event delivery.
    pub url: Url,

    /// Shared secret used to sign payloads with HMAC-SHA256.
    pub secret: SecretString,

    /// Per-delivery timeout.
    #[serde(deserialize_with = "deserialize_duration", default = "default_timeout")]
    pub timeout: Duration,

    /// Retries after the initial delivery attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
    3
}
