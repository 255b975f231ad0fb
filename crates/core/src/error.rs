//! Shared error type
//!
//! Each crate defines its own `thiserror` enum for local failures and
//! converts into this type at crate boundaries.

use thiserror::Error;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the DM assistant
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Rag(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures the pipeline should absorb with a degraded
    /// result rather than surface to the follower.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Error::Llm(_) | Error::Rag(_) | Error::Timeout(_) | Error::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradable() {
        assert!(Error::Llm("down".into()).is_degradable());
        assert!(Error::Timeout(5000).is_degradable());
        assert!(!Error::Config("bad file".into()).is_degradable());
    }
}
