//! Product catalog entries

use serde::{Deserialize, Serialize};

/// One sellable product or service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Stable product identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Price in `currency` units
    pub price: f64,
    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Checkout URL, if any
    #[serde(default)]
    pub url: Option<String>,
    /// Short description used as retrieval context
    #[serde(default)]
    pub description: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            currency: default_currency(),
            url: None,
            description: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Text form fed into the retrieval indices
    pub fn as_document_text(&self) -> String {
        if self.description.is_empty() {
            format!("{}: {:.2} {}", self.name, self.price, self.currency)
        } else {
            format!(
                "{}: {:.2} {}. {}",
                self.name, self.price, self.currency, self.description
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_text() {
        let product = Product::new("curso-ia", "Curso de IA", 99.0)
            .with_description("Aprende a automatizar tu negocio");
        let text = product.as_document_text();
        assert!(text.contains("Curso de IA"));
        assert!(text.contains("99.00 EUR"));
        assert!(text.contains("automatizar"));
    }
}
