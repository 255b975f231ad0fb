//! DM assistant agent
//!
//! Everything between an inbound follower message and an outbound reply:
//! - Intent classification (fast pattern path + optional LLM path)
//! - Conversation-level funnel analysis
//! - Response guardrails (price, URL, hallucination, length checks)
//! - LRU+TTL caching of responses and search results
//! - Multi-window rate limiting
//! - The `DmPipeline` orchestrator tying it all together

pub mod analyzer;
pub mod cache;
pub mod guardrails;
pub mod intent;
pub mod pipeline;
pub mod rate_limiter;

pub use analyzer::{ConversationAnalysis, ConversationAnalyzer, FunnelStage};
pub use cache::Cache;
pub use guardrails::{Guardrail, ValidationResult};
pub use intent::{Intent, IntentClassifier, IntentResult};
pub use pipeline::{DmPipeline, PipelineReply};
pub use rate_limiter::{LimitDecision, RateLimiter, RemainingTokens};

use thiserror::Error;

/// Agent errors
///
/// These stay internal to the crate: `DmPipeline::handle_message` never
/// surfaces an error to its caller, it degrades to a fallback reply.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("No language model configured")]
    NoModel,
}

impl From<dm_assistant_core::Error> for AgentError {
    fn from(err: dm_assistant_core::Error) -> Self {
        AgentError::Generation(err.to_string())
    }
}

impl From<dm_assistant_reasoning::ReasoningError> for AgentError {
    fn from(err: dm_assistant_reasoning::ReasoningError) -> Self {
        AgentError::Generation(err.to_string())
    }
}

impl From<AgentError> for dm_assistant_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Generation(detail) => dm_assistant_core::Error::Llm(detail),
            AgentError::NoModel => {
                dm_assistant_core::Error::Config("no language model configured".into())
            }
        }
    }
}
