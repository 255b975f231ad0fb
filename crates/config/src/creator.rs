//! Per-creator configuration snapshot

use crate::{ConfigError, FallbackMessages, GuardrailConfig, Product, RateLimitConfig};
use serde::{Deserialize, Serialize};

/// Everything the pipeline needs to know about one creator account.
///
/// The optional fields (`guarantee_days`, `business_hours`,
/// `contact_email`) double as guardrail whitelist data: a hallucination
/// pattern is only flagged when the matching topic is NOT configured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorConfig {
    /// Creator namespace key used across indices and limits
    pub creator_id: String,
    /// Display name used in prompts
    pub name: String,
    /// Response language ("es" or "en")
    #[serde(default = "default_language")]
    pub language: String,
    /// Free-text context injected into classification prompts
    #[serde(default)]
    pub context: String,
    /// Product catalog (prices feed the guardrail price check)
    #[serde(default)]
    pub products: Vec<Product>,
    /// Extra allowed URL fragments on top of the default allow-list
    #[serde(default)]
    pub allowed_urls: Vec<String>,
    /// Money-back guarantee period, if the creator really offers one
    #[serde(default)]
    pub guarantee_days: Option<u32>,
    /// Stated business hours, if the creator really has them
    #[serde(default)]
    pub business_hours: Option<String>,
    /// Contact email the assistant may promise to use
    #[serde(default)]
    pub contact_email: Option<String>,
    /// Guardrail settings
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    /// Rate limit capacities
    #[serde(default)]
    pub limits: RateLimitConfig,
    /// Localized stalling replies
    #[serde(default)]
    pub fallbacks: FallbackMessages,
}

fn default_language() -> String {
    "es".to_string()
}

impl Default for CreatorConfig {
    fn default() -> Self {
        Self {
            creator_id: String::new(),
            name: String::new(),
            language: default_language(),
            context: String::new(),
            products: Vec::new(),
            allowed_urls: Vec::new(),
            guarantee_days: None,
            business_hours: None,
            contact_email: None,
            guardrail: GuardrailConfig::default(),
            limits: RateLimitConfig::default(),
            fallbacks: FallbackMessages::default(),
        }
    }
}

impl CreatorConfig {
    /// Minimal config for tests and ad-hoc use
    pub fn new(creator_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            creator_id: creator_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    /// Set the response language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Known product prices, for the guardrail price check
    pub fn known_prices(&self) -> Vec<f64> {
        self.products.iter().map(|p| p.price).collect()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.creator_id.trim().is_empty() {
            return Err(ConfigError::Invalid("creator_id must not be empty".into()));
        }
        for product in &self.products {
            if product.price < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "product {} has negative price",
                    product.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_prices() {
        let config = CreatorConfig::new("c1", "Laura")
            .with_product(Product::new("p1", "Curso", 99.0))
            .with_product(Product::new("p2", "Mentoría", 250.0));
        assert_eq!(config.known_prices(), vec![99.0, 250.0]);
    }

    #[test]
    fn test_validate_negative_price() {
        let config = CreatorConfig::new("c1", "Laura").with_product(Product::new("p1", "X", -5.0));
        assert!(config.validate().is_err());
    }
}
