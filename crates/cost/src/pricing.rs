//! Per-model pricing in USD per 1000 tokens.

use std::collections::BTreeMap;

use config::{ModelPriceConfig, Platform};

/// Price of one model, in USD per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    /// USD per 1000 prompt tokens.
    pub input_per_1k: f64,
    /// USD per 1000 completion tokens.
    pub output_per_1k: f64,
}

impl ModelPrice {
    /// Calculate the USD cost for the given token counts.
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.input_per_1k + (completion_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

/// Errors from pricing lookups.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// No price is known for the platform/model combination.
    #[error("No pricing available for {platform}/{model}")]
    PricingUnavailable {
        /// The platform the lookup was made for.
        platform: Platform,
        /// The model the lookup was made for.
        model: String,
    },
}

/// Pricing table keyed by (platform, model).
///
/// Built-in prices cover the common models of each supported platform;
/// configuration overrides take precedence over built-ins.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: BTreeMap<(Platform, String), ModelPrice>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PricingTable {
    /// The built-in pricing table, approximate list prices as of early 2026.
    pub fn builtin() -> Self {
        let mut prices = BTreeMap::new();

        let builtin: &[(Platform, &str, f64, f64)] = &[
            (Platform::Openai, "gpt-4o", 0.0025, 0.01),
            (Platform::Openai, "gpt-4o-mini", 0.00015, 0.0006),
            (Platform::Openai, "gpt-4.1", 0.002, 0.008),
            (Platform::Openai, "o3-mini", 0.0011, 0.0044),
            (Platform::Anthropic, "claude-opus-4", 0.015, 0.075),
            (Platform::Anthropic, "claude-sonnet-4", 0.003, 0.015),
            (Platform::Anthropic, "claude-haiku-4", 0.0008, 0.004),
            (Platform::Perplexity, "sonar", 0.001, 0.001),
            (Platform::Perplexity, "sonar-pro", 0.003, 0.015),
            (Platform::Google, "gemini-2.0-flash", 0.0001, 0.0004),
            (Platform::Google, "gemini-1.5-pro", 0.00125, 0.005),
            (Platform::Cohere, "command-r-plus", 0.0025, 0.01),
            (Platform::Mistral, "mistral-large", 0.002, 0.006),
        ];

        for (platform, model, input_per_1k, output_per_1k) in builtin {
            prices.insert(
                (*platform, (*model).to_string()),
                ModelPrice {
                    input_per_1k: *input_per_1k,
                    output_per_1k: *output_per_1k,
                },
            );
        }

        Self { prices }
    }

    /// Build the table from built-ins plus configuration overrides.
    ///
    /// Override keys are `"platform/model"`; entries with an unknown platform
    /// are logged and skipped.
    pub fn with_overrides(overrides: &BTreeMap<String, ModelPriceConfig>) -> Self {
        let mut table = Self::builtin();

        for (key, price) in overrides {
            let Some((platform, model)) = key.split_once('/') else {
                log::warn!("Ignoring pricing override '{key}', expected 'platform/model'");
                continue;
            };

            let Ok(platform) = platform.parse::<Platform>() else {
                log::warn!("Ignoring pricing override '{key}', unknown platform");
                continue;
            };

            table.prices.insert(
                (platform, model.to_string()),
                ModelPrice {
                    input_per_1k: price.input_per_1k,
                    output_per_1k: price.output_per_1k,
                },
            );
        }

        table
    }

    /// Look up the price for a platform/model combination.
    pub fn lookup(&self, platform: Platform, model: &str) -> Result<ModelPrice, PricingError> {
        self.prices
            .get(&(platform, model.to_string()))
            .copied()
            .ok_or_else(|| PricingError::PricingUnavailable {
                platform,
                model: model.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_all_platforms() {
        let table = PricingTable::builtin();

        for platform in [
            Platform::Openai,
            Platform::Anthropic,
            Platform::Perplexity,
            Platform::Google,
            Platform::Cohere,
            Platform::Mistral,
        ] {
            assert!(
                table.prices.keys().any(|(p, _)| *p == platform),
                "no builtin price for {platform}"
            );
        }
    }

    #[test]
    fn unknown_model_is_a_typed_error() {
        let table = PricingTable::builtin();
        let error = table.lookup(Platform::Openai, "gpt-imaginary").unwrap_err();

        assert!(matches!(error, PricingError::PricingUnavailable { .. }));
    }

    #[test]
    fn override_takes_precedence_over_builtin() {
        let overrides = BTreeMap::from([(
            "openai/gpt-4o".to_string(),
            ModelPriceConfig {
                input_per_1k: 0.002,
                output_per_1k: 0.004,
            },
        )]);

        let table = PricingTable::with_overrides(&overrides);
        let price = table.lookup(Platform::Openai, "gpt-4o").unwrap();

        assert_eq!(price.input_per_1k, 0.002);
        assert_eq!(price.output_per_1k, 0.004);
    }

    #[test]
    fn malformed_override_key_is_skipped() {
        let overrides = BTreeMap::from([(
            "gpt-4o".to_string(),
            ModelPriceConfig {
                input_per_1k: 1.0,
                output_per_1k: 1.0,
            },
        )]);

        let table = PricingTable::with_overrides(&overrides);
        let price = table.lookup(Platform::Openai, "gpt-4o").unwrap();

        // Builtin price is untouched.
        assert_eq!(price.input_per_1k, 0.0025);
    }
}
