//! Guardrail settings

use serde::{Deserialize, Serialize};

/// Response guardrail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Master switch. Disabled means every response validates as-is.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Responses longer than this are flagged regardless of content
    #[serde(default = "default_max_length")]
    pub max_response_length: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_length() -> usize {
    2000
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_response_length: default_max_length(),
        }
    }
}
