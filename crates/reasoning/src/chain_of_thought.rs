//! Chain-of-thought: stepwise decomposition
//!
//! Wraps the query in an instruction demanding explicit numbered steps
//! followed by a final answer behind a literal `RESPUESTA:` marker.

use crate::ReasoningError;
use dm_assistant_core::LanguageModel;
use dm_assistant_llm::PromptBuilder;
use std::sync::Arc;

const ANSWER_MARKER: &str = "RESPUESTA:";

/// Decomposed generation result
#[derive(Debug, Clone)]
pub struct CotResult {
    /// The numbered reasoning steps, as emitted by the model
    pub reasoning: String,
    /// Text after the answer marker (whole output when absent)
    pub answer: String,
    /// Raw model output
    pub full_response: String,
}

impl CotResult {
    /// Count of numbered step markers in the reasoning
    pub fn step_count(&self) -> usize {
        self.reasoning
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                let mut chars = trimmed.chars();
                matches!(
                    (chars.next(), chars.next()),
                    (Some(d), Some('.' | ')')) if d.is_ascii_digit()
                )
            })
            .count()
    }
}

/// Stepwise reasoning strategy
pub struct ChainOfThought {
    llm: Arc<dyn LanguageModel>,
}

impl ChainOfThought {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn build_prompt(query: &str, context: Option<&str>, insist: bool) -> String {
        let system = if insist {
            "Razona OBLIGATORIAMENTE en pasos numerados (1., 2., 3., ...), \
             uno por línea. Es imprescindible mostrar cada paso. Al final \
             escribe 'RESPUESTA:' seguido de la respuesta final."
        } else {
            "Razona paso a paso en pasos numerados (1., 2., ...) y al final \
             escribe 'RESPUESTA:' seguido de la respuesta final."
        };
        PromptBuilder::new()
            .system(system)
            .section("Contexto", context.unwrap_or(""))
            .section("Pregunta", query)
            .build()
    }

    fn split_response(raw: &str) -> CotResult {
        match raw.find(ANSWER_MARKER) {
            Some(pos) => CotResult {
                reasoning: raw[..pos].trim().to_string(),
                answer: raw[pos + ANSWER_MARKER.len()..].trim().to_string(),
                full_response: raw.to_string(),
            },
            None => CotResult {
                reasoning: String::new(),
                answer: raw.trim().to_string(),
                full_response: raw.to_string(),
            },
        }
    }

    /// Single stepwise generation
    pub async fn generate(
        &self,
        query: &str,
        context: Option<&str>,
    ) -> Result<CotResult, ReasoningError> {
        let prompt = Self::build_prompt(query, context, false);
        let raw = self
            .llm
            .generate(&prompt, 0.3)
            .await
            .map_err(|e| ReasoningError::Generation(e.to_string()))?;
        Ok(Self::split_response(&raw))
    }

    /// Stepwise generation with a minimum step requirement.
    ///
    /// Re-prompts once, more insistently, if the first attempt shows
    /// fewer than `require_steps` steps. At most one retry, no loop.
    pub async fn solve_complex(
        &self,
        query: &str,
        context: Option<&str>,
        require_steps: usize,
    ) -> Result<CotResult, ReasoningError> {
        let first = self.generate(query, context).await?;
        if first.step_count() >= require_steps {
            return Ok(first);
        }

        tracing::debug!(
            steps = first.step_count(),
            required = require_steps,
            "too few reasoning steps, re-prompting once"
        );
        let prompt = Self::build_prompt(query, context, true);
        match self.llm.generate(&prompt, 0.3).await {
            Ok(raw) => Ok(Self::split_response(&raw)),
            // The retry is best-effort; keep the first result on failure
            Err(e) => {
                tracing::warn!(error = %e, "insistent re-prompt failed, keeping first attempt");
                Ok(first)
            }
        }
    }
}
