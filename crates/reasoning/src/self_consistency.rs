//! Self-consistency: sample-and-vote
//!
//! Generates N independent samples and keeps the most frequent answer.
//! Samples run concurrently (no shared state between them); aggregation
//! waits for all of them. Individual failures drop out of the pool and
//! confidence is computed over the samples that succeeded.

use crate::ReasoningError;
use dm_assistant_core::LanguageModel;
use dm_assistant_llm::PromptBuilder;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Consensus over N samples
#[derive(Debug, Clone)]
pub struct ConsensusResult {
    /// Most frequent answer (whitespace-trimmed)
    pub consensus: String,
    /// `count(mode) / samples_succeeded`, in [0, 1]
    pub confidence: f32,
    /// Samples that succeeded
    pub samples_succeeded: usize,
    /// Samples requested
    pub samples_requested: usize,
}

/// Verdict on a proposed response
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Whether the proposed response agreed with the consensus
    pub valid: bool,
    /// The consensus answer, offered as a replacement when invalid
    pub consensus: String,
    /// Consensus confidence
    pub confidence: f32,
}

/// Sample-and-vote strategy
pub struct SelfConsistency {
    llm: Arc<dyn LanguageModel>,
    /// Sampling temperature; high on purpose so samples actually vary
    temperature: f32,
}

impl SelfConsistency {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            temperature: 0.8,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_prompt(query: &str, context: Option<&str>) -> String {
        PromptBuilder::new()
            .system("Responde a la pregunta del seguidor de forma breve y precisa.")
            .section("Contexto", context.unwrap_or(""))
            .section("Pregunta", query)
            .build()
    }

    /// Generate `n` samples and vote.
    ///
    /// Failed samples are logged and skipped; only an all-failure batch
    /// is an error.
    pub async fn solve(
        &self,
        query: &str,
        n: usize,
        context: Option<&str>,
    ) -> Result<ConsensusResult, ReasoningError> {
        let prompt = Self::build_prompt(query, context);

        let futures = (0..n).map(|_| {
            let llm = Arc::clone(&self.llm);
            let prompt = prompt.clone();
            let temperature = self.temperature;
            async move { llm.generate(&prompt, temperature).await }
        });
        let outcomes = join_all(futures).await;

        let mut answers: Vec<String> = Vec::with_capacity(n);
        for outcome in outcomes {
            match outcome {
                Ok(text) => answers.push(text.trim().to_string()),
                Err(e) => tracing::warn!(error = %e, "sample failed, dropping from pool"),
            }
        }

        if answers.is_empty() {
            return Err(ReasoningError::AllSamplesFailed(n));
        }

        let succeeded = answers.len();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for answer in &answers {
            *counts.entry(answer.as_str()).or_insert(0) += 1;
        }
        // Mode; ties resolve to the earliest-seen answer
        let mut consensus = answers[0].as_str();
        let mut count = counts[consensus];
        for answer in &answers[1..] {
            let c = counts[answer.as_str()];
            if c > count {
                consensus = answer.as_str();
                count = c;
            }
        }

        Ok(ConsensusResult {
            consensus: consensus.to_string(),
            confidence: count as f32 / succeeded as f32,
            samples_succeeded: succeeded,
            samples_requested: n,
        })
    }

    /// Accept `proposed` only if it is substring-equivalent (either
    /// direction) to the consensus and consensus confidence clears the
    /// threshold.
    pub async fn verify_response(
        &self,
        proposed: &str,
        query: &str,
        context: Option<&str>,
        n: usize,
        threshold: f32,
    ) -> Result<VerificationResult, ReasoningError> {
        let result = self.solve(query, n, context).await?;

        let proposed_trimmed = proposed.trim();
        let agrees = !proposed_trimmed.is_empty()
            && (proposed_trimmed.contains(&result.consensus)
                || result.consensus.contains(proposed_trimmed));

        Ok(VerificationResult {
            valid: agrees && result.confidence >= threshold,
            consensus: result.consensus,
            confidence: result.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_assistant_llm::{FailingBackend, ScriptedBackend};

    #[tokio::test]
    async fn test_unanimous_consensus() {
        let strategy = SelfConsistency::new(Arc::new(ScriptedBackend::constant("42")));
        let result = strategy.solve("la respuesta?", 5, None).await.unwrap();
        assert_eq!(result.consensus, "42");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.samples_succeeded, 5);
    }

    #[tokio::test]
    async fn test_majority_vote() {
        let strategy = SelfConsistency::new(Arc::new(ScriptedBackend::new(vec![
            "99€".into(),
            "99€".into(),
            "100€".into(),
        ])));
        let result = strategy.solve("precio?", 3, None).await.unwrap();
        assert_eq!(result.consensus, "99€");
        assert!((result.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_all_failures_is_error() {
        let strategy = SelfConsistency::new(Arc::new(FailingBackend));
        let result = strategy.solve("q", 4, None).await;
        assert!(matches!(result, Err(ReasoningError::AllSamplesFailed(4))));
    }

    #[tokio::test]
    async fn test_verify_accepts_substring_match() {
        let strategy = SelfConsistency::new(Arc::new(ScriptedBackend::constant("El curso cuesta 99€")));
        let verdict = strategy
            .verify_response("99€", "precio?", None, 3, 0.6)
            .await
            .unwrap();
        assert!(verdict.valid);
    }

    #[tokio::test]
    async fn test_verify_rejects_disagreement() {
        let strategy = SelfConsistency::new(Arc::new(ScriptedBackend::constant("99€")));
        let verdict = strategy
            .verify_response("150€", "precio?", None, 3, 0.6)
            .await
            .unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.consensus, "99€");
    }
}
