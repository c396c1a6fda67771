//! Brandlens configuration structures to map the brandlens.toml configuration.

#![deny(missing_docs)]

mod loader;
mod pricing;
mod providers;
mod rate_limit;
mod retry;
mod telemetry;
mod webhook;

use std::{collections::BTreeMap, net::SocketAddr, path::Path};

use serde::Deserialize;

pub use pricing::ModelPriceConfig;
pub use providers::{ModelConfig, Platform, PlatformParseError, ProviderConfig};
pub use rate_limit::{PlatformRateLimits, RateLimitQuota};
pub use retry::RetryConfig;
pub use telemetry::{OtlpExporterConfig, OtlpProtocol, TelemetryConfig};
pub use webhook::WebhookConfig;

/// Main configuration structure for the brandlens application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,

    /// Telemetry (metrics export) configuration.
    pub telemetry: TelemetryConfig,

    /// LLM provider configurations, keyed by platform.
    pub providers: BTreeMap<Platform, ProviderConfig>,

    /// Pricing overrides keyed by `"platform/model"`.
    ///
    /// Entries here take precedence over the built-in pricing table.
    pub pricing: BTreeMap<String, ModelPriceConfig>,

    /// Retry behavior for retryable provider failures.
    pub retry: RetryConfig,

    /// Webhook endpoints notified about job completion and anomalies.
    pub webhooks: Vec<WebhookConfig>,
}

impl Config {
    /// Load configuration from a TOML file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the configuration, returning non-fatal warnings.
    pub fn validate(&self) -> anyhow::Result<Vec<String>> {
        loader::validate(self)
    }

    /// Whether any LLM providers are configured.
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }
}

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    #[test]
    fn config_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert!(config.providers.is_empty());
        assert!(config.webhooks.is_empty());
        assert!(config.server.listen_address.is_none());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn config_with_provider_and_webhook() {
        let config = indoc! {r#"
            [server]
            listen_address = "127.0.0.1:7450"

            [providers.openai]
            api_key = "sk-test"

            [providers.openai.models.gpt-4o]

            [[webhooks]]
            url = "https://hooks.example.com/brandlens"
            secret = "whsec-1"
        "#};

        let config: Config = toml::from_str(config).unwrap();

        assert_eq!(config.providers.len(), 1);
        assert!(config.providers.contains_key(&Platform::Openai));
        assert_eq!(config.webhooks.len(), 1);

        assert_debug_snapshot!(&config.server, @r#"
        ServerConfig {
            listen_address: Some(
                127.0.0.1:7450,
            ),
        }
        "#);
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let result: Result<Config, _> = toml::from_str("unknown_section = true");
        assert!(result.is_err());
    }
}
