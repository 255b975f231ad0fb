//! Configuration for the DM assistant
//!
//! The core treats all of this as a read-only snapshot per call: products
//! and creator settings feed the guardrail, fallback messages feed the
//! degraded paths, and limit capacities feed the rate limiter. Loading
//! and refreshing the snapshot is the embedding application's job.

pub mod creator;
pub mod fallback;
pub mod guardrail;
pub mod limits;
pub mod product;

pub use creator::CreatorConfig;
pub use fallback::FallbackMessages;
pub use guardrail::GuardrailConfig;
pub use limits::RateLimitConfig;
pub use product::Product;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for dm_assistant_core::Error {
    fn from(err: ConfigError) -> Self {
        dm_assistant_core::Error::Config(err.to_string())
    }
}

/// Load a creator configuration from a TOML file
pub fn load_creator_config(path: impl AsRef<Path>) -> Result<CreatorConfig, ConfigError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let config: CreatorConfig = toml::from_str(&raw)?;
    config.validate()?;
    tracing::info!(creator = %config.creator_id, "loaded creator config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
creator_id = "creator-7"
name = "Laura"
language = "es"

[[products]]
id = "curso-ia"
name = "Curso de IA"
price = 99.0
currency = "EUR"
url = "https://buy.stripe.com/curso-ia"
"#
        )
        .unwrap();

        let config = load_creator_config(file.path()).unwrap();
        assert_eq!(config.creator_id, "creator-7");
        assert_eq!(config.products.len(), 1);
        assert_eq!(config.products[0].price, 99.0);
    }

    #[test]
    fn test_load_rejects_empty_creator_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "creator_id = \"\"\nname = \"X\"\n").unwrap();
        assert!(load_creator_config(file.path()).is_err());
    }
}
