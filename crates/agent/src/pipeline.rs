//! Per-message orchestration
//!
//! One inbound follower message in, at most one outbound reply out.
//! Order of operations: rate limit, classify, short-circuit the cheap
//! intents (spam, escalation), consult the response cache, then
//! retrieve context and generate with an intent-matched reasoning
//! strategy, validate through the guardrail, and cache the survivor.
//!
//! Nothing here returns an error to the caller. Every failure path
//! degrades to a localized stalling reply or to silence.

use crate::{
    AgentError, Cache, Guardrail, Intent, IntentClassifier, IntentResult, LimitDecision,
    RateLimiter,
};
use dm_assistant_config::CreatorConfig;
use dm_assistant_core::{AlertEvent, AlertSink, LanguageModel, NullAlertSink, RetrievalResult, Turn};
use dm_assistant_llm::PromptBuilder;
use dm_assistant_rag::{HybridRetriever, SearchOptions};
use dm_assistant_reasoning::{ChainOfThought, Reflexion};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Documents pulled into the generation prompt
const RETRIEVAL_TOP_K: usize = 5;
/// Deadline for the whole generate-and-validate leg
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(25);

/// Outcome of handling one message
#[derive(Debug, Clone)]
pub struct PipelineReply {
    pub request_id: Uuid,
    /// None means "send nothing" (spam, rate limited)
    pub reply: Option<String>,
    pub intent: IntentResult,
    /// Reply came from the response cache
    pub cached: bool,
    pub rate_limited: bool,
}

/// Everything between an inbound DM and an outbound reply for one
/// creator account. One instance per creator, shared across requests.
pub struct DmPipeline {
    creator: CreatorConfig,
    llm: Option<Arc<dyn LanguageModel>>,
    retriever: Arc<HybridRetriever>,
    classifier: IntentClassifier,
    guardrail: Guardrail,
    response_cache: Cache<String>,
    search_cache: Cache<Vec<RetrievalResult>>,
    rate_limiter: RateLimiter,
    alerts: Arc<dyn AlertSink>,
    reply_timeout: Duration,
}

impl DmPipeline {
    pub fn new(creator: CreatorConfig, retriever: Arc<HybridRetriever>) -> Self {
        let rate_limiter = RateLimiter::new(creator.limits);
        let guardrail = Guardrail::from_config(&creator.guardrail);
        Self {
            creator,
            llm: None,
            retriever,
            classifier: IntentClassifier::new(),
            guardrail,
            response_cache: Cache::response_cache(),
            search_cache: Cache::search_cache(),
            rate_limiter,
            alerts: Arc::new(NullAlertSink),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.classifier = IntentClassifier::with_llm(Arc::clone(&llm));
        self.llm = Some(llm);
        self
    }

    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn cache_stats(&self) -> String {
        format!(
            "responses: {} | searches: {}",
            self.response_cache.stats(),
            self.search_cache.stats()
        )
    }

    /// Handle one inbound message. Infallible by design.
    pub async fn handle_message(
        &self,
        follower_id: &str,
        message: &str,
        history: &[Turn],
    ) -> PipelineReply {
        let request_id = Uuid::new_v4();
        let limit_key = format!("{}:{follower_id}", self.creator.creator_id);

        if let LimitDecision::Denied { reason } = self.rate_limiter.check_limit(&limit_key, 1.0) {
            tracing::info!(%request_id, follower = follower_id, %reason, "message dropped");
            return PipelineReply {
                request_id,
                reply: None,
                intent: self
                    .classifier
                    .classify_patterns_only(message),
                cached: false,
                rate_limited: true,
            };
        }

        let intent = self
            .classifier
            .classify(message, &self.creator.context, history)
            .await;
        tracing::debug!(
            %request_id,
            intent = %intent.intent,
            confidence = intent.confidence,
            "classified message"
        );

        match intent.intent {
            Intent::Spam => {
                return PipelineReply {
                    request_id,
                    reply: None,
                    intent,
                    cached: false,
                    rate_limited: false,
                };
            }
            Intent::Escalation => {
                self.alerts
                    .notify(AlertEvent::Escalation {
                        creator_id: self.creator.creator_id.clone(),
                        follower_id: follower_id.to_string(),
                        message: message.to_string(),
                    })
                    .await;
                return PipelineReply {
                    request_id,
                    reply: Some(self.handoff_reply()),
                    intent,
                    cached: false,
                    rate_limited: false,
                };
            }
            _ => {}
        }

        let cache_key = Cache::<String>::make_key(
            message,
            &[
                ("intent", Some(intent.intent.as_str())),
                ("lang", Some(self.creator.language.as_str())),
            ],
        );
        if let Some(reply) = self.response_cache.get(&cache_key) {
            return PipelineReply {
                request_id,
                reply: Some(reply),
                intent,
                cached: true,
                rate_limited: false,
            };
        }

        let generated = tokio::time::timeout(
            self.reply_timeout,
            self.generate_reply(message, &intent, history),
        )
        .await;

        let reply = match generated {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                // Degradable failures (model down, retrieval broken) are
                // worth an alert; a missing model is a standing
                // configuration state, not an incident.
                let err: dm_assistant_core::Error = e.into();
                if err.is_degradable() {
                    tracing::warn!(%request_id, error = %err, "generation failed, using fallback");
                    self.alerts
                        .notify(AlertEvent::LlmFailure {
                            creator_id: self.creator.creator_id.clone(),
                            detail: err.to_string(),
                        })
                        .await;
                } else {
                    tracing::debug!(%request_id, error = %err, "generation unavailable, using fallback");
                }
                return PipelineReply {
                    request_id,
                    reply: Some(self.stalling_reply()),
                    intent,
                    cached: false,
                    rate_limited: false,
                };
            }
            Err(_) => {
                tracing::warn!(%request_id, "generation timed out, using fallback");
                self.alerts
                    .notify(AlertEvent::LlmFailure {
                        creator_id: self.creator.creator_id.clone(),
                        detail: format!("timed out after {:?}", self.reply_timeout),
                    })
                    .await;
                return PipelineReply {
                    request_id,
                    reply: Some(self.stalling_reply()),
                    intent,
                    cached: false,
                    rate_limited: false,
                };
            }
        };

        let validation = self.guardrail.validate_response(&reply, &self.creator);
        if !validation.valid {
            self.alerts
                .notify(AlertEvent::GuardrailRejection {
                    creator_id: self.creator.creator_id.clone(),
                    issues: validation.issues.clone(),
                })
                .await;
        }
        let safe = self
            .guardrail
            .get_safe_response(&reply, &validation, &self.creator);

        // Only validated replies are worth caching
        if validation.valid {
            self.response_cache.set(cache_key, safe.clone());
        }

        PipelineReply {
            request_id,
            reply: Some(safe),
            intent,
            cached: false,
            rate_limited: false,
        }
    }

    /// Retrieve context and generate with the strategy matched to the
    /// intent: reflexion where fabrication hurts most, chain-of-thought
    /// for explanatory questions, a single direct pass for everything
    /// else.
    async fn generate_reply(
        &self,
        message: &str,
        intent: &IntentResult,
        history: &[Turn],
    ) -> Result<String, AgentError> {
        let llm = self.llm.as_ref().ok_or(AgentError::NoModel)?;
        let context = self.retrieve_context(message).await;
        let context_ref = (!context.is_empty()).then_some(context.as_str());

        let reply = match intent.intent {
            Intent::QuestionProduct | Intent::Objection => {
                let strategy = Reflexion::new(Arc::clone(llm));
                strategy.solve(message, context_ref, 1).await?.answer
            }
            Intent::QuestionGeneral | Intent::Support => {
                let strategy = ChainOfThought::new(Arc::clone(llm));
                strategy.generate(message, context_ref).await?.answer
            }
            _ => {
                let prompt = PromptBuilder::new()
                    .system(format!(
                        "Eres el asistente de {} y respondes DMs de seguidores en su \
                         idioma, con cercanía y sin inventar datos.",
                        self.creator.name
                    ))
                    .section("Contexto", context_ref.unwrap_or(""))
                    .history(history, 5)
                    .section("Mensaje", message)
                    .build();
                llm.generate(&prompt, 0.7)
                    .await
                    .map_err(|e| AgentError::Generation(e.to_string()))?
            }
        };
        Ok(reply)
    }

    /// Hybrid retrieval scoped to this creator, with its own cache.
    /// Retrieval failure means generating without context, not failing
    /// the message.
    async fn retrieve_context(&self, message: &str) -> String {
        let key = Cache::<Vec<RetrievalResult>>::make_key(
            message,
            &[("namespace", Some(self.creator.creator_id.as_str()))],
        );
        let results = match self.search_cache.get(&key) {
            Some(results) => results,
            None => {
                let options = SearchOptions::hybrid().with_namespace(&self.creator.creator_id);
                match self.retriever.search(message, RETRIEVAL_TOP_K, &options).await {
                    Ok(results) => {
                        self.search_cache.set(key, results.clone());
                        results
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "retrieval failed, generating without context");
                        Vec::new()
                    }
                }
            }
        };

        results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn stalling_reply(&self) -> String {
        let replies = self.creator.fallbacks.for_language(&self.creator.language);
        replies
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Un momento, por favor.".to_string())
    }

    fn handoff_reply(&self) -> String {
        match self.creator.language.as_str() {
            "en" => format!(
                "Of course! I'll pass this on to {} so a real person gets back to you soon.",
                self.creator.name
            ),
            _ => format!(
                "¡Claro! Le paso tu mensaje a {} para que una persona te responda lo antes posible.",
                self.creator.name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_assistant_config::Product;
    use dm_assistant_llm::{FailingBackend, ScriptedBackend};
    use dm_assistant_rag::RetrieverConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        llm_failures: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AlertSink for CountingSink {
        async fn notify(&self, event: AlertEvent) {
            if matches!(event, AlertEvent::LlmFailure { .. }) {
                self.llm_failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn test_pipeline(llm: Option<Arc<dyn LanguageModel>>) -> DmPipeline {
        let creator = CreatorConfig::new("creator-1", "Laura")
            .with_product(Product::new("curso", "Curso de IA", 99.0));
        let retriever = Arc::new(HybridRetriever::new(RetrieverConfig::default()));
        let pipeline = DmPipeline::new(creator, retriever);
        match llm {
            Some(llm) => pipeline.with_llm(llm),
            None => pipeline,
        }
    }

    #[tokio::test]
    async fn test_spam_gets_no_reply() {
        let pipeline = test_pipeline(None);
        let filler = "a".repeat(600);
        let message = format!("{filler} gratis http://spam.example.com");
        let outcome = pipeline.handle_message("f1", &message, &[]).await;
        assert_eq!(outcome.intent.intent, Intent::Spam);
        assert!(outcome.reply.is_none());
    }

    #[tokio::test]
    async fn test_escalation_replies_with_handoff() {
        let pipeline = test_pipeline(None);
        let outcome = pipeline
            .handle_message("f1", "quiero hablar con una persona", &[])
            .await;
        assert_eq!(outcome.intent.intent, Intent::Escalation);
        assert!(outcome.reply.unwrap().contains("Laura"));
    }

    #[tokio::test]
    async fn test_no_model_degrades_to_stalling_reply() {
        let pipeline = test_pipeline(None);
        let outcome = pipeline.handle_message("f1", "hola!", &[]).await;
        assert_eq!(outcome.intent.intent, Intent::Greeting);
        // No LLM configured: the reply is a fallback, never an error
        let reply = outcome.reply.unwrap();
        assert!(!reply.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_alerts_but_missing_model_does_not() {
        // A model that errors mid-conversation is an incident
        let sink = Arc::new(CountingSink::default());
        let sink_handle: Arc<dyn AlertSink> = sink.clone();
        let failing: Arc<dyn LanguageModel> = Arc::new(FailingBackend);
        let pipeline = test_pipeline(Some(failing)).with_alert_sink(sink_handle);
        let outcome = pipeline
            .handle_message("f1", "mensaje sin patrón claro", &[])
            .await;
        assert!(outcome.reply.is_some());
        assert_eq!(sink.llm_failures.load(Ordering::SeqCst), 1);

        // No model configured is a standing state, not an incident
        let sink = Arc::new(CountingSink::default());
        let sink_handle: Arc<dyn AlertSink> = sink.clone();
        let pipeline = test_pipeline(None).with_alert_sink(sink_handle);
        let outcome = pipeline.handle_message("f1", "hola!", &[]).await;
        assert!(outcome.reply.is_some());
        assert_eq!(sink.llm_failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_reply_is_cached() {
        let backend: Arc<dyn LanguageModel> =
            Arc::new(ScriptedBackend::constant("¡Hola! Encantada de saludarte 😊"));
        let pipeline = test_pipeline(Some(backend));

        let first = pipeline.handle_message("f1", "hola!", &[]).await;
        assert!(!first.cached);
        let second = pipeline.handle_message("f1", "hola!", &[]).await;
        assert!(second.cached);
        assert_eq!(first.reply, second.reply);
    }

    #[tokio::test]
    async fn test_guardrail_blocks_fabricated_price() {
        // Product costs 99 but the model insists on 150
        let backend: Arc<dyn LanguageModel> =
            Arc::new(ScriptedBackend::constant("El curso cuesta 150€"));
        let pipeline = test_pipeline(Some(backend));

        let outcome = pipeline.handle_message("f1", "hola!", &[]).await;
        let reply = outcome.reply.unwrap();
        assert!(!reply.contains("150"));
        // Rejected replies must not be cached
        let again = pipeline.handle_message("f1", "hola!", &[]).await;
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn test_product_question_goes_through_reflexion() {
        // Reflexion: generate, then a clean critique ends the loop
        let backend: Arc<dyn LanguageModel> = Arc::new(ScriptedBackend::new(vec![
            "El Curso de IA cuesta 99€ e incluye 3 módulos".into(),
            "no hay errores".into(),
        ]));
        let creator = CreatorConfig::new("creator-1", "Laura")
            .with_product(Product::new("curso", "Curso de IA", 99.0));
        let retriever = Arc::new(HybridRetriever::new(RetrieverConfig::default()));
        retriever
            .add_document(
                dm_assistant_core::Document::new(
                    "curso",
                    "Curso de IA: 99.00 EUR. Automatiza tu negocio con IA",
                )
                .with_metadata("creator_id", "creator-1"),
            )
            .await
            .unwrap();
        let pipeline = DmPipeline::new(creator, retriever).with_llm(backend);

        let outcome = pipeline
            .handle_message("f1", "cuánto cuesta el curso?", &[])
            .await;
        assert_eq!(outcome.intent.intent, Intent::QuestionProduct);
        let reply = outcome.reply.unwrap();
        assert!(reply.contains("99"));
    }

    #[tokio::test]
    async fn test_rate_limit_drops_message() {
        let mut creator = CreatorConfig::new("creator-1", "Laura");
        creator.limits.per_minute = 1.0;
        let retriever = Arc::new(HybridRetriever::new(RetrieverConfig::default()));
        let pipeline = DmPipeline::new(creator, retriever);

        let first = pipeline.handle_message("f1", "hola!", &[]).await;
        assert!(!first.rate_limited);
        let second = pipeline.handle_message("f1", "hola!", &[]).await;
        assert!(second.rate_limited);
        assert!(second.reply.is_none());
    }
}
