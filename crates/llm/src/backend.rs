//! HTTP language model backend
//!
//! Speaks the OpenAI-compatible chat completions protocol, which covers
//! OpenAI itself plus Ollama and most local inference servers.

use crate::LlmError;
use async_trait::async_trait;
use dm_assistant_core::{ChatMessage, LanguageModel, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// LLM backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// API endpoint base URL
    pub endpoint: String,
    /// API key (optional for local servers)
    pub api_key: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            max_tokens: 512,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// OpenAI-compatible HTTP backend
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: LlmConfig,
}

impl HttpBackend {
    pub fn new(config: LlmConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint)
    }

    async fn execute_request(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<String, LlmError> {
        let mut builder = self.client.post(self.api_url()).json(request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // 5xx is retryable, 4xx is not
            if status.is_server_error() {
                return Err(LlmError::Network(format!("server error {status}: {body}")));
            }
            return Err(LlmError::Api(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".into()))
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout)
    }

    async fn chat_with_retry(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> std::result::Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut backoff = self.config.initial_backoff;
        let mut last_error = LlmError::Network("no attempt made".into());

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    max = self.config.max_retries,
                    "LLM request failed, retrying after {:?}",
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(text) => return Ok(text),
                Err(e) if Self::is_retryable(&e) => last_error = e,
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl LanguageModel for HttpBackend {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let messages = vec![ChatMessage::user(prompt)];
        Ok(self.chat_with_retry(messages, temperature).await?)
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(self.chat_with_retry(messages.to_vec(), 0.7).await?)
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/models", self.config.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(HttpBackend::is_retryable(&LlmError::Timeout));
        assert!(HttpBackend::is_retryable(&LlmError::Network("x".into())));
        assert!(!HttpBackend::is_retryable(&LlmError::Api("400".into())));
    }

    #[test]
    fn test_api_url() {
        let backend = HttpBackend::new(LlmConfig {
            endpoint: "http://localhost:11434/v1".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            backend.api_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }
}
