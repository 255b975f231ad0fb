//! Localized stalling replies
//!
//! Used whenever generation or validation cannot produce a trustworthy
//! answer. The safe default is to buy time, never to confirm unverified
//! facts or show an error to the follower.

use serde::{Deserialize, Serialize};

/// Per-language fallback reply sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackMessages {
    #[serde(default = "default_spanish")]
    pub es: Vec<String>,
    #[serde(default = "default_english")]
    pub en: Vec<String>,
}

fn default_spanish() -> Vec<String> {
    vec![
        "Déjame revisarlo y te respondo en un momento 😊".to_string(),
        "Buena pregunta, lo confirmo y te escribo enseguida.".to_string(),
        "Ahora mismo lo compruebo y te digo, ¡un segundo!".to_string(),
    ]
}

fn default_english() -> Vec<String> {
    vec![
        "Let me double-check that and get back to you in a moment 😊".to_string(),
        "Good question, let me confirm and I'll reply right away.".to_string(),
        "Give me a second to check that for you!".to_string(),
    ]
}

impl Default for FallbackMessages {
    fn default() -> Self {
        Self {
            es: default_spanish(),
            en: default_english(),
        }
    }
}

impl FallbackMessages {
    /// Replies for a language, falling back to Spanish for unknown codes
    pub fn for_language(&self, language: &str) -> &[String] {
        match language {
            "en" => &self.en,
            _ => &self.es,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_selection() {
        let messages = FallbackMessages::default();
        assert!(!messages.for_language("en").is_empty());
        assert!(!messages.for_language("es").is_empty());
        // Unknown language falls back to Spanish
        assert_eq!(messages.for_language("fr"), messages.for_language("es"));
    }
}
