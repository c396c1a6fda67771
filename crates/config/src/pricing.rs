//! Pricing override configuration.

use serde::Deserialize;

/// Per-model pricing override.
///
/// Keyed in the configuration by `"platform/model"`, e.g.
/// `pricing."openai/gpt-4o"`. Overrides take precedence over the built-in
/// pricing table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPriceConfig {
    /// USD cost per 1000 prompt tokens.
    pub input_per_1k: f64,
    /// USD cost per 1000 completion tokens.
    pub output_per_1k: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn price_override_parses() {
        let config = indoc! {r#"
            input_per_1k = 0.0025
            output_per_1k = 0.01
        "#};

        let price: ModelPriceConfig = toml::from_str(config).unwrap();

        assert_eq!(price.input_per_1k, 0.0025);
        assert_eq!(price.output_per_1k, 0.01);
    }

    #[test]
    fn price_rejects_unknown_fields() {
        let result: Result<ModelPriceConfig, _> = toml::from_str(indoc! {r#"
            input_per_1k = 0.0025
            output_per_1k = 0.01
            cached_per_1k = 0.001
        "#});

        assert!(result.is_err());
    }
}
