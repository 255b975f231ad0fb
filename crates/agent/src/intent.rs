//! Intent classification
//!
//! Two-tier design: a curated substring pattern table answers the cheap,
//! high-precision cases (greetings, strong purchase phrases, explicit
//! "talk to a human" requests) without touching the network; everything
//! else goes to the language model with a strict-JSON contract. Neither
//! tier ever raises to the caller.

use dm_assistant_core::{LanguageModel, Turn};
use dm_assistant_llm::PromptBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fast-path match confidence
const PATTERN_CONFIDENCE: f32 = 0.85;
/// Spam heuristic confidence
const SPAM_CONFIDENCE: f32 = 0.9;
/// Confidence assigned when both tiers degrade
const DEGRADED_CONFIDENCE: f32 = 0.4;
/// History turns included in the classification prompt
const HISTORY_LIMIT: usize = 5;

/// Fixed intent taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    QuestionGeneral,
    QuestionProduct,
    InterestSoft,
    InterestStrong,
    Objection,
    Support,
    FeedbackPositive,
    FeedbackNegative,
    Escalation,
    Spam,
    Other,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::QuestionGeneral => "question_general",
            Intent::QuestionProduct => "question_product",
            Intent::InterestSoft => "interest_soft",
            Intent::InterestStrong => "interest_strong",
            Intent::Objection => "objection",
            Intent::Support => "support",
            Intent::FeedbackPositive => "feedback_positive",
            Intent::FeedbackNegative => "feedback_negative",
            Intent::Escalation => "escalation",
            Intent::Spam => "spam",
            Intent::Other => "other",
        }
    }

    /// What the pipeline should do with a message of this intent
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Intent::Greeting => "respond_warmly",
            Intent::QuestionGeneral => "answer_with_context",
            Intent::QuestionProduct => "answer_with_product_details",
            Intent::InterestSoft => "nurture_interest",
            Intent::InterestStrong => "send_purchase_info",
            Intent::Objection => "address_objection",
            Intent::Support => "resolve_or_escalate",
            Intent::FeedbackPositive => "thank_and_engage",
            Intent::FeedbackNegative => "acknowledge_and_escalate",
            Intent::Escalation => "handoff_to_human",
            Intent::Spam => "ignore",
            Intent::Other => "answer_with_context",
        }
    }

    /// Parse a model-returned label, tolerating loose phrasing
    fn from_label(label: &str) -> Option<Intent> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        let intent = match normalized.as_str() {
            "greeting" | "saludo" | "hello" => Intent::Greeting,
            "question_general" | "question" | "pregunta" => Intent::QuestionGeneral,
            "question_product" | "product_question" | "pregunta_producto" => {
                Intent::QuestionProduct
            }
            "interest_soft" | "interest" | "interes" | "interés" => Intent::InterestSoft,
            "interest_strong" | "purchase" | "buy" | "compra" => Intent::InterestStrong,
            "objection" | "objecion" | "objeción" | "price_objection" => Intent::Objection,
            "support" | "soporte" | "help" | "ayuda" => Intent::Support,
            "feedback_positive" | "positive_feedback" | "praise" => Intent::FeedbackPositive,
            "feedback_negative" | "negative_feedback" | "complaint" | "queja" => {
                Intent::FeedbackNegative
            }
            "escalation" | "escalate" | "human" | "humano" => Intent::Escalation,
            "spam" => Intent::Spam,
            "other" | "otro" | "unknown" => Intent::Other,
            _ => return None,
        };
        Some(intent)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classification outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    /// Finer-grained label from the model, when it supplies one
    pub sub_intent: Option<String>,
    /// Entities the model extracted, in order of mention
    pub entities: Vec<String>,
    pub suggested_action: String,
    /// Why this intent was chosen (pattern name, model reasoning, or
    /// degradation note)
    pub reasoning: String,
}

impl IntentResult {
    fn new(intent: Intent, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            intent,
            confidence,
            sub_intent: None,
            entities: Vec::new(),
            suggested_action: intent.suggested_action().to_string(),
            reasoning: reasoning.into(),
        }
    }
}

/// Shape the model must return
#[derive(Debug, Deserialize)]
struct ModelClassification {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    sub_intent: Option<String>,
    #[serde(default)]
    entities: Option<Vec<String>>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Substring patterns checked before any model call.
///
/// Kept deliberately small and high-precision: a pattern here means "we
/// are confident enough to skip the model", not "best guess".
const FAST_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::Escalation,
        &[
            "hablar con una persona",
            "hablar con un humano",
            "hablar con alguien real",
            "atención al cliente",
            "talk to a human",
            "talk to a person",
        ],
    ),
    (
        Intent::InterestStrong,
        &[
            "quiero comprar",
            "cómo puedo pagar",
            "como puedo pagar",
            "dónde pago",
            "donde pago",
            "lo quiero ya",
            "me apunto",
            "i want to buy",
        ],
    ),
    (
        Intent::Objection,
        &[
            "es muy caro",
            "demasiado caro",
            "no me lo puedo permitir",
            "too expensive",
        ],
    ),
    (
        Intent::QuestionProduct,
        &[
            "cuánto cuesta",
            "cuanto cuesta",
            "qué precio",
            "que precio",
            "qué incluye",
            "que incluye",
            "how much is",
        ],
    ),
    (
        Intent::InterestSoft,
        &["me interesa", "cuéntame más", "cuentame mas", "suena bien"],
    ),
    (
        Intent::Support,
        &[
            "no puedo acceder",
            "no me funciona",
            "no funciona",
            "tengo un problema",
            "no he recibido",
        ],
    ),
    (
        Intent::FeedbackPositive,
        &["me encanta", "me ha encantado", "es increíble", "muchas gracias por"],
    ),
    (
        Intent::FeedbackNegative,
        &["no me gusta", "estoy decepcionad", "qué decepción", "que decepcion"],
    ),
    (
        Intent::Greeting,
        &["hola", "buenas", "buenos días", "buenos dias", "hello", "hey"],
    ),
];

/// Promotional markers used by the spam heuristic
const PROMO_KEYWORDS: &[&str] = &[
    "gratis", "oferta", "gana dinero", "promoción", "promocion", "descuento", "free money",
    "click here", "earn money",
];

/// Minimum length for the spam heuristic to apply
const SPAM_MIN_LEN: usize = 500;

/// Stateless per-call classifier. Each message is classified given only
/// the message itself, the creator context string, and recent history.
pub struct IntentClassifier {
    llm: Option<Arc<dyn LanguageModel>>,
}

impl IntentClassifier {
    /// Pattern-only classifier
    pub fn new() -> Self {
        Self { llm: None }
    }

    /// Classifier with a model behind the fast path
    pub fn with_llm(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm: Some(llm) }
    }

    /// Classify one message. Never returns an error: every failure path
    /// degrades to a low-confidence result.
    pub async fn classify(
        &self,
        message: &str,
        creator_context: &str,
        history: &[Turn],
    ) -> IntentResult {
        if let Some(result) = Self::spam_check(message) {
            return result;
        }
        if let Some(result) = Self::fast_path(message) {
            return result;
        }

        let Some(llm) = &self.llm else {
            return IntentResult::new(
                Intent::Other,
                DEGRADED_CONFIDENCE,
                "no pattern match and no model configured",
            );
        };

        let prompt = Self::build_prompt(message, creator_context, history);
        match llm.generate(&prompt, 0.1).await {
            Ok(raw) => Self::parse_model_output(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "intent model call failed, degrading to other");
                IntentResult::new(
                    Intent::Other,
                    DEGRADED_CONFIDENCE,
                    format!("model call failed: {e}"),
                )
            }
        }
    }

    /// Pattern tiers only, no model call. Used where classification
    /// must stay synchronous and free (conversation analysis, dropped
    /// messages).
    pub fn classify_patterns_only(&self, message: &str) -> IntentResult {
        Self::spam_check(message)
            .or_else(|| Self::fast_path(message))
            .unwrap_or_else(|| {
                IntentResult::new(Intent::Other, DEGRADED_CONFIDENCE, "no pattern match")
            })
    }

    /// Length + link + promo-keyword heuristic, independent of the
    /// pattern table
    fn spam_check(message: &str) -> Option<IntentResult> {
        let lower = message.to_lowercase();
        let promotional = PROMO_KEYWORDS.iter().any(|kw| lower.contains(kw));
        if message.len() > SPAM_MIN_LEN && lower.contains("http") && promotional {
            return Some(IntentResult::new(
                Intent::Spam,
                SPAM_CONFIDENCE,
                "long message with link and promotional keywords",
            ));
        }
        None
    }

    /// Substring pattern table, case-insensitive. First match wins.
    pub(crate) fn fast_path(message: &str) -> Option<IntentResult> {
        let lower = message.to_lowercase();
        for (intent, patterns) in FAST_PATTERNS {
            for pattern in *patterns {
                if lower.contains(pattern) {
                    return Some(IntentResult::new(
                        *intent,
                        PATTERN_CONFIDENCE,
                        format!("pattern match: '{pattern}'"),
                    ));
                }
            }
        }
        None
    }

    fn build_prompt(message: &str, creator_context: &str, history: &[Turn]) -> String {
        let categories = "\
            - greeting: saludo sin pregunta concreta\n\
            - question_general: pregunta no ligada a un producto (ej. 'qué opinas de X')\n\
            - question_product: pregunta sobre un producto, precio o contenido\n\
            - interest_soft: curiosidad sin intención clara ('me interesa saber más')\n\
            - interest_strong: intención clara de compra ('quiero comprarlo')\n\
            - objection: duda o pega sobre precio/valor ('me parece caro')\n\
            - support: problema de acceso o postventa ('no puedo entrar al curso')\n\
            - feedback_positive: elogio o agradecimiento\n\
            - feedback_negative: queja o decepción\n\
            - escalation: pide hablar con una persona\n\
            - spam: promoción no solicitada o enlaces sospechosos\n\
            - other: nada de lo anterior";

        PromptBuilder::new()
            .system(
                "Clasifica el mensaje de un seguidor en exactamente una categoría. \
                 Responde SOLO con JSON: {\"intent\": \"...\", \"confidence\": 0.0-1.0, \
                 \"sub_intent\": \"...\", \"entities\": [\"...\"], \"reasoning\": \"...\"}",
            )
            .section("Categorías", categories)
            .section("Contexto del creador", creator_context)
            .history(history, HISTORY_LIMIT)
            .section("Mensaje a clasificar", message)
            .build()
    }

    /// Parse the model's JSON, tolerating code fences and surrounding
    /// prose. Unknown labels fall through the alias table to `other`.
    fn parse_model_output(raw: &str) -> IntentResult {
        let cleaned = raw.replace("```json", "").replace("```", "");
        let json_span = match (cleaned.find('{'), cleaned.rfind('}')) {
            (Some(start), Some(end)) if end > start => &cleaned[start..=end],
            _ => {
                return IntentResult::new(
                    Intent::Other,
                    DEGRADED_CONFIDENCE,
                    "model output contained no JSON object",
                )
            }
        };

        let parsed: ModelClassification = match serde_json::from_str(json_span) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "intent JSON parse failed");
                return IntentResult::new(
                    Intent::Other,
                    DEGRADED_CONFIDENCE,
                    format!("JSON parse failed: {e}"),
                );
            }
        };

        let intent = match Intent::from_label(&parsed.intent) {
            Some(intent) => intent,
            None => {
                tracing::debug!(label = %parsed.intent, "unknown intent label from model");
                Intent::Other
            }
        };

        let confidence = parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
        IntentResult {
            intent,
            confidence,
            sub_intent: parsed.sub_intent,
            entities: parsed.entities.unwrap_or_default(),
            suggested_action: intent.suggested_action().to_string(),
            reasoning: parsed
                .reasoning
                .unwrap_or_else(|| "model classification".to_string()),
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}
