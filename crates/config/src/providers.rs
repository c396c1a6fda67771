//! LLM provider configuration structures.

use std::{collections::BTreeMap, fmt, str::FromStr};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::rate_limit::PlatformRateLimits;

/// An external LLM platform.
///
/// Used as the routing, rate-limit and cost-accounting key throughout the
/// system. The set is closed: adding a platform means adding an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// OpenAI chat completions.
    Openai,
    /// Anthropic messages API.
    Anthropic,
    /// Perplexity search-augmented completions.
    Perplexity,
    /// Google Gemini.
    Google,
    /// Cohere chat API.
    Cohere,
    /// Mistral chat completions.
    Mistral,
}

impl Platform {
    /// The canonical lowercase name of the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Openai => "openai",
            Platform::Anthropic => "anthropic",
            Platform::Perplexity => "perplexity",
            Platform::Google => "google",
            Platform::Cohere => "cohere",
            Platform::Mistral => "mistral",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown platform name.
#[derive(Debug, thiserror::Error)]
#[error("unknown platform '{0}'")]
pub struct PlatformParseError(String);

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Platform::Openai),
            "anthropic" => Ok(Platform::Anthropic),
            "perplexity" => Ok(Platform::Perplexity),
            "google" => Ok(Platform::Google),
            "cohere" => Ok(Platform::Cohere),
            "mistral" => Ok(Platform::Mistral),
            other => Err(PlatformParseError(other.to_string())),
        }
    }
}

/// Configuration for one LLM provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key for authentication.
    pub api_key: SecretString,

    /// Custom base URL for the provider API.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model used for fan-out requests that do not name one explicitly.
    /// Defaults to the first configured model.
    #[serde(default)]
    pub default_model: Option<String>,

    /// Models exposed through this provider. At least one must be configured.
    #[serde(deserialize_with = "deserialize_non_empty_models")]
    pub models: BTreeMap<String, ModelConfig>,

    /// Per-platform rate limits (requests and tokens per interval).
    #[serde(default)]
    pub rate_limits: Option<PlatformRateLimits>,
}

impl ProviderConfig {
    /// The model used when a caller does not pick one, e.g. brand-monitoring
    /// fan-out across platforms.
    pub fn default_model(&self) -> &str {
        self.default_model
            .as_deref()
            .or_else(|| self.models.keys().next().map(|k| k.as_str()))
            .unwrap_or_default()
    }

    /// Resolve a configured model id to the name sent upstream.
    ///
    /// Returns `None` when the model is not configured for this provider.
    pub fn resolve_model<'a>(&'a self, id: &'a str) -> Option<&'a str> {
        self.models.get(id).map(|m| m.rename.as_deref().unwrap_or(id))
    }
}

/// Configuration for an individual model within a provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Optional rename - the actual provider model name.
    /// If not specified, the model ID (map key) is used.
    #[serde(default)]
    pub rename: Option<String>,
}

/// Custom deserializer that ensures at least one model is configured.
fn deserialize_non_empty_models<'de, D>(deserializer: D) -> Result<BTreeMap<String, ModelConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let models = Option::<BTreeMap<String, ModelConfig>>::deserialize(deserializer)?.unwrap_or_default();

    if models.is_empty() {
        Err(Error::custom("At least one model must be configured for each provider"))
    } else {
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn platform_round_trip() {
        for platform in [
            Platform::Openai,
            Platform::Anthropic,
            Platform::Perplexity,
            Platform::Google,
            Platform::Cohere,
            Platform::Mistral,
        ] {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn unknown_platform_fails_to_parse() {
        assert!("replicate".parse::<Platform>().is_err());
    }

    #[test]
    fn provider_requires_models() {
        // Missing entirely: rejected by serde before our deserializer runs.
        let result: Result<ProviderConfig, _> = toml::from_str(r#"api_key = "sk-test""#);
        assert!(result.is_err());

        // Present but empty: rejected with the explicit message.
        let config = indoc! {r#"
            api_key = "sk-test"

            [models]
        "#};

        let result: Result<ProviderConfig, _> = toml::from_str(config);
        let error = result.unwrap_err().to_string();
        assert!(error.contains("At least one model"));
    }

    #[test]
    fn provider_model_rename() {
        let config = indoc! {r#"
            api_key = "sk-test"

            [models.gpt-4o]
            rename = "gpt-4o-2024-11-20"

            [models.gpt-4o-mini]
        "#};

        let config: ProviderConfig = toml::from_str(config).unwrap();

        assert_eq!(config.resolve_model("gpt-4o"), Some("gpt-4o-2024-11-20"));
        assert_eq!(config.resolve_model("gpt-4o-mini"), Some("gpt-4o-mini"));
        assert_eq!(config.resolve_model("gpt-3.5-turbo"), None);
    }

    #[test]
    fn default_model_falls_back_to_first_configured() {
        let config = indoc! {r#"
            api_key = "sk-test"

            [models.sonar-pro]

            [models.sonar]
        "#};

        let config: ProviderConfig = toml::from_str(config).unwrap();

        // BTreeMap ordering: "sonar" before "sonar-pro".
        assert_eq!(config.default_model(), "sonar");
    }

    #[test]
    fn explicit_default_model() {
        let config = indoc! {r#"
            api_key = "sk-test"
            default_model = "sonar-pro"

            [models.sonar-pro]

            [models.sonar]
        "#};

        let config: ProviderConfig = toml::from_str(config).unwrap();
        assert_eq!(config.default_model(), "sonar-pro");
    }
}
