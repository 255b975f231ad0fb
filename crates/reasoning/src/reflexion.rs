//! Reflexion: generate → critique → refine
//!
//! A fixed-point loop that stops early when the critique finds nothing
//! to fix (once the minimum iteration count is met) or the refinement
//! stops changing the answer. The full iteration trace is returned for
//! observability.

use crate::ReasoningError;
use dm_assistant_core::LanguageModel;
use dm_assistant_llm::PromptBuilder;
use std::sync::Arc;

/// Phrases a critique uses to say there is nothing to fix
const CLEAN_CRITIQUE_PHRASES: &[&str] = &["no hay errores", "no errors", "sin errores"];

/// Reflexion configuration
#[derive(Debug, Clone, Copy)]
pub struct ReflexionConfig {
    /// Hard cap on generate-critique-refine rounds
    pub max_iterations: usize,
    /// Temperature for the critique pass (low on purpose)
    pub critique_temperature: f32,
    /// Temperature for generation and refinement
    pub generation_temperature: f32,
}

impl Default for ReflexionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            critique_temperature: 0.2,
            generation_temperature: 0.7,
        }
    }
}

/// One generate-critique round
#[derive(Debug, Clone)]
pub struct ReflexionRound {
    pub answer: String,
    pub critique: String,
}

/// Final answer plus the full iteration trace
#[derive(Debug, Clone)]
pub struct ReflexionResult {
    pub answer: String,
    pub iterations: usize,
    pub trace: Vec<ReflexionRound>,
    /// True when a generation failure forced a best-effort exit
    pub degraded: bool,
}

/// Generate-critique-refine strategy
pub struct Reflexion {
    llm: Arc<dyn LanguageModel>,
    config: ReflexionConfig,
}

impl Reflexion {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            config: ReflexionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReflexionConfig) -> Self {
        self.config = config;
        self
    }

    fn initial_prompt(query: &str, context: Option<&str>) -> String {
        PromptBuilder::new()
            .system("Responde a la pregunta del seguidor con precisión.")
            .section("Contexto", context.unwrap_or(""))
            .section("Pregunta", query)
            .build()
    }

    fn critique_prompt(query: &str, answer: &str) -> String {
        PromptBuilder::new()
            .system(
                "Revisa la respuesta y señala debilidades, errores factuales \
                 o afirmaciones sin respaldo. Si no encuentras nada, escribe \
                 'no hay errores'.",
            )
            .section("Pregunta", query)
            .section("Respuesta a revisar", answer)
            .build()
    }

    fn refine_prompt(query: &str, answer: &str, critique: &str) -> String {
        PromptBuilder::new()
            .system("Mejora la respuesta aplicando la crítica. Devuelve solo la respuesta mejorada.")
            .section("Pregunta", query)
            .section("Respuesta anterior", answer)
            .section("Crítica", critique)
            .build()
    }

    fn critique_is_clean(critique: &str) -> bool {
        let lower = critique.to_lowercase();
        CLEAN_CRITIQUE_PHRASES
            .iter()
            .any(|phrase| lower.contains(phrase))
    }

    /// Run the loop. Generation failures at any stage end the loop with
    /// whatever answer exists so far rather than propagating.
    pub async fn solve(
        &self,
        query: &str,
        context: Option<&str>,
        min_iterations: usize,
    ) -> Result<ReflexionResult, ReasoningError> {
        let mut answer = match self
            .llm
            .generate(
                &Self::initial_prompt(query, context),
                self.config.generation_temperature,
            )
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => return Err(ReasoningError::Generation(e.to_string())),
        };

        let mut trace = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            let critique = match self
                .llm
                .generate(
                    &Self::critique_prompt(query, &answer),
                    self.config.critique_temperature,
                )
                .await
            {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, iteration, "critique failed, keeping current answer");
                    return Ok(ReflexionResult {
                        answer,
                        iterations: iteration,
                        trace,
                        degraded: true,
                    });
                }
            };

            trace.push(ReflexionRound {
                answer: answer.clone(),
                critique: critique.clone(),
            });

            if Self::critique_is_clean(&critique) && iteration >= min_iterations {
                return Ok(ReflexionResult {
                    answer,
                    iterations: iteration,
                    trace,
                    degraded: false,
                });
            }

            let refined = match self
                .llm
                .generate(
                    &Self::refine_prompt(query, &answer, &critique),
                    self.config.generation_temperature,
                )
                .await
            {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, iteration, "refinement failed, keeping current answer");
                    return Ok(ReflexionResult {
                        answer,
                        iterations: iteration,
                        trace,
                        degraded: true,
                    });
                }
            };

            // Fixed point: refinement no longer changes the answer
            if refined == answer {
                return Ok(ReflexionResult {
                    answer,
                    iterations: iteration,
                    trace,
                    degraded: false,
                });
            }
            answer = refined;
        }

        let iterations = self.config.max_iterations;
        Ok(ReflexionResult {
            answer,
            iterations,
            trace,
            degraded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_assistant_llm::ScriptedBackend;

    #[tokio::test]
    async fn test_clean_critique_stops_after_min_iterations() {
        // generate, then critique says clean
        let backend = Arc::new(ScriptedBackend::new(vec![
            "El curso cuesta 99€".into(),
            "no hay errores".into(),
        ]));
        let strategy = Reflexion::new(backend.clone());
        let result = strategy.solve("precio?", None, 1).await.unwrap();

        assert_eq!(result.answer, "El curso cuesta 99€");
        assert_eq!(result.iterations, 1);
        assert_eq!(result.trace.len(), 1);
        assert!(!result.degraded);
        // initial + critique only, no refine call
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_fixed_point_stops_loop() {
        // critique finds issues but refinement returns the same text
        let backend = Arc::new(ScriptedBackend::new(vec![
            "respuesta".into(),
            "falta detalle".into(),
            "respuesta".into(),
        ]));
        let strategy = Reflexion::new(backend);
        let result = strategy.solve("q", None, 1).await.unwrap();
        assert_eq!(result.answer, "respuesta");
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn test_refinement_applies_critique() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "cuesta 100€".into(),
            "el precio correcto es 99€".into(),
            "cuesta 99€".into(),
            "no hay errores".into(),
        ]));
        let strategy = Reflexion::new(backend);
        let result = strategy.solve("precio?", None, 1).await.unwrap();
        assert_eq!(result.answer, "cuesta 99€");
        assert_eq!(result.iterations, 2);
        assert_eq!(result.trace.len(), 2);
    }

    #[tokio::test]
    async fn test_min_iterations_forces_extra_round() {
        // Critique is clean from the start but min_iterations=2 forces a
        // refine and a second critique
        let backend = Arc::new(ScriptedBackend::new(vec![
            "respuesta".into(),
            "no hay errores".into(),
            "respuesta mejorada".into(),
            "no hay errores".into(),
        ]));
        let strategy = Reflexion::new(backend);
        let result = strategy.solve("q", None, 2).await.unwrap();
        assert_eq!(result.iterations, 2);
        assert_eq!(result.answer, "respuesta mejorada");
    }

    #[tokio::test]
    async fn test_max_iterations_cap() {
        // Critique never clean, refinement always changes the answer
        let script: Vec<String> = (0..12).map(|i| format!("texto {i}")).collect();
        let backend = Arc::new(ScriptedBackend::new(script));
        let strategy = Reflexion::new(backend);
        let result = strategy.solve("q", None, 1).await.unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.trace.len(), 3);
    }
}
