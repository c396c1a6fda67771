//! Telemetry configuration for metrics export.

use std::{collections::BTreeMap, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;
use url::Url;

/// Telemetry configuration for observability.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name for telemetry identification.
    service_name: Option<String>,

    /// Custom resource attributes to attach to all telemetry.
    #[serde(default)]
    resource_attributes: BTreeMap<String, String>,

    /// Exporters configuration.
    #[serde(default)]
    exporters: ExportersConfig,
}

impl TelemetryConfig {
    /// Get the service name.
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Get the resource attributes.
    pub fn resource_attributes(&self) -> &BTreeMap<String, String> {
        &self.resource_attributes
    }

    /// The OTLP exporter configuration for metrics, if enabled.
    pub fn metrics_otlp_config(&self) -> Option<&OtlpExporterConfig> {
        self.exporters.otlp.enabled.then_some(&self.exporters.otlp)
    }
}

/// Exporters configuration for telemetry.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExportersConfig {
    /// OTLP exporter configuration.
    #[serde(default)]
    pub otlp: OtlpExporterConfig,
}

/// OTLP exporter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpExporterConfig {
    /// Whether this exporter is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,

    /// Protocol to use (grpc or http).
    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Request timeout.
    #[serde(deserialize_with = "deserialize_duration", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for OtlpExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            protocol: OtlpProtocol::default(),
            timeout: default_timeout(),
        }
    }
}

fn default_endpoint() -> Url {
    Url::parse("http://localhost:4317").expect("default URL should be valid")
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

/// OTLP protocol selection.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// gRPC protocol (default).
    #[default]
    Grpc,
    /// HTTP/protobuf protocol.
    Http,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn telemetry_disabled_by_default() {
        let config: TelemetryConfig = toml::from_str("").unwrap();
        assert!(config.metrics_otlp_config().is_none());
    }

    #[test]
    fn otlp_exporter_enabled() {
        let config: TelemetryConfig = toml::from_str(indoc! {r#"
            service_name = "brandlens-test"

            [exporters.otlp]
            enabled = true
            endpoint = "http://collector:4318"
            protocol = "http"
            timeout = "10s"
        "#})
        .unwrap();

        assert_eq!(config.service_name(), Some("brandlens-test"));

        let otlp = config.metrics_otlp_config().unwrap();
        assert_eq!(otlp.endpoint.as_str(), "http://collector:4318/");
        assert_eq!(otlp.protocol, OtlpProtocol::Http);
        assert_eq!(otlp.timeout, Duration::from_secs(10));
    }
}
