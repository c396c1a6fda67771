use std::path::Path;

use anyhow::{Context, bail};

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse configuration from {}", path.display()))?;

    Ok(config)
}

/// Validate the configuration, returning non-fatal warnings.
///
/// Fatal problems (invalid webhook URL schemes, zero-limit quotas) produce an
/// error; suspicious-but-workable configurations produce warnings the caller
/// is expected to log.
pub fn validate(config: &Config) -> anyhow::Result<Vec<String>> {
    let mut warnings = Vec::new();

    for webhook in &config.webhooks {
        match webhook.url.scheme() {
            "https" => {}
            "http" => {
                warnings.push(format!(
                    "webhook endpoint {} uses plain http, signatures will be sent in the clear",
                    webhook.url
                ));
            }
            other => bail!("webhook endpoint {} has unsupported scheme '{other}'", webhook.url),
        }
    }

    for (platform, provider) in &config.providers {
        let Some(limits) = &provider.rate_limits else {
            warnings.push(format!("provider {platform} has no rate limits configured"));
            continue;
        };

        for (kind, quota) in [("requests", &limits.requests), ("tokens", &limits.tokens)] {
            if let Some(quota) = quota {
                if quota.limit == 0 {
                    bail!("provider {platform} has a zero {kind} limit, which would reject every call");
                }

                if quota.interval.is_zero() {
                    bail!("provider {platform} has a zero {kind} interval");
                }
            }
        }
    }

    for key in config.pricing.keys() {
        if !key.contains('/') {
            warnings.push(format!(
                "pricing key '{key}' is not in 'platform/model' form and will never match"
            ));
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    use crate::{Config, Platform};

    fn load(config: &str) -> anyhow::Result<Config> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config.as_bytes()).unwrap();

        Config::load(file.path())
    }

    #[test]
    fn loads_full_configuration() {
        let config = load(indoc! {r#"
            [server]
            listen_address = "127.0.0.1:7450"

            [providers.anthropic]
            api_key = "sk-ant-test"

            [providers.anthropic.models.claude-sonnet-4]

            [providers.anthropic.rate_limits.requests]
            limit = 100
            interval = "60s"

            [pricing."anthropic/claude-sonnet-4"]
            input_per_1k = 0.003
            output_per_1k = 0.015
        "#})
        .unwrap();

        assert!(config.has_providers());
        assert!(config.providers.contains_key(&Platform::Anthropic));
        assert_eq!(config.pricing.len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Config::load("/nonexistent/brandlens.toml");
        let error = result.unwrap_err().to_string();
        assert!(error.contains("failed to read configuration"));
    }

    #[test]
    fn zero_limit_fails_validation() {
        let config = load(indoc! {r#"
            [providers.openai]
            api_key = "sk-test"

            [providers.openai.models.gpt-4o]

            [providers.openai.rate_limits.requests]
            limit = 0
            interval = "60s"
        "#})
        .unwrap();

        let error = config.validate().unwrap_err().to_string();
        assert!(error.contains("zero requests limit"));
    }

    #[test]
    fn missing_rate_limits_warn() {
        let config = load(indoc! {r#"
            [providers.openai]
            api_key = "sk-test"

            [providers.openai.models.gpt-4o]
        "#})
        .unwrap();

        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no rate limits"));
    }

    #[test]
    fn non_https_webhook_warns() {
        let config = load(indoc! {r#"
            [[webhooks]]
            url = "http://hooks.internal/brandlens"
            secret = "whsec-1"
        "#})
        .unwrap();

        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("plain http")));
    }
}
