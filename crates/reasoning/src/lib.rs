//! Multi-pass reasoning strategies
//!
//! Three independent, composable quality/cost tradeoffs over the
//! abstract `LanguageModel` capability:
//! - Self-consistency spends N× generation cost for answer stability
//! - Chain-of-thought spends structure for multi-step correctness
//! - Reflexion spends iteration rounds for self-correction
//!
//! The caller chooses per query based on cost budget and classified
//! intent.

pub mod chain_of_thought;
pub mod reflexion;
pub mod self_consistency;

pub use chain_of_thought::{ChainOfThought, CotResult};
pub use reflexion::{Reflexion, ReflexionConfig, ReflexionResult, ReflexionRound};
pub use self_consistency::{ConsensusResult, SelfConsistency, VerificationResult};

use thiserror::Error;

/// Reasoning errors
#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("All {0} samples failed")]
    AllSamplesFailed(usize),

    #[error("Generation failed: {0}")]
    Generation(String),
}

impl From<ReasoningError> for dm_assistant_core::Error {
    fn from(err: ReasoningError) -> Self {
        dm_assistant_core::Error::Llm(err.to_string())
    }
}
