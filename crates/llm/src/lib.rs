//! Language model integration
//!
//! Features:
//! - OpenAI-compatible HTTP backend with retry and backoff
//! - Scripted backend as an explicit, first-class degraded mode
//! - Prompt building helpers

pub mod backend;
pub mod mock;
pub mod prompt;

pub use backend::{HttpBackend, LlmConfig};
pub use mock::{FailingBackend, ScriptedBackend};
pub use prompt::PromptBuilder;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for dm_assistant_core::Error {
    fn from(err: LlmError) -> Self {
        dm_assistant_core::Error::Llm(err.to_string())
    }
}
