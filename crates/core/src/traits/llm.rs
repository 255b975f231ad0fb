//! Language model trait

use crate::{ChatMessage, Result};
use async_trait::async_trait;

/// Language model interface
///
/// One explicit async contract for every provider. `chat` is a derived
/// convenience over `generate`; backends with a native chat endpoint
/// should override it.
///
/// Implementations:
/// - `HttpBackend` - OpenAI-compatible HTTP API
/// - `ScriptedBackend` - deterministic canned responses for tests
///
/// # Example
///
/// ```ignore
/// let llm: Arc<dyn LanguageModel> = Arc::new(HttpBackend::new(config)?);
/// let reply = llm.generate("Resume este mensaje", 0.3).await?;
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a completion for a plain prompt.
    ///
    /// Provider errors surface as `Err`; no retry policy is assumed by
    /// callers beyond what the backend itself implements.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Chat completion over an ordered message list.
    ///
    /// Default implementation flattens the messages into a single prompt
    /// and delegates to `generate`.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let prompt = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.generate(&prompt, 0.7).await
    }

    /// Whether the backend is reachable right now
    async fn is_available(&self) -> bool {
        true
    }

    /// Model name for logging
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoLlm;

    #[async_trait]
    impl LanguageModel for EchoLlm {
        async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
            Ok(format!("echo: {prompt}"))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_chat_default_delegates_to_generate() {
        let llm = EchoLlm;
        let messages = vec![ChatMessage::system("eres un bot"), ChatMessage::user("hola")];
        let reply = llm.chat(&messages).await.unwrap();
        assert!(reply.contains("system: eres un bot"));
        assert!(reply.contains("user: hola"));
    }
}
