//! Scripted backends
//!
//! The degraded/no-provider mode is a named implementation selected by
//! configuration, not an accident of a missing dependency. Tests drive
//! the reasoning strategies with these.

use async_trait::async_trait;
use dm_assistant_core::{Error, LanguageModel, Result};
use parking_lot::Mutex;

/// Backend that replays a fixed script of responses.
///
/// Responses are served in order; the last one repeats once the script
/// is exhausted. An empty script echoes the prompt.
pub struct ScriptedBackend {
    script: Vec<String>,
    cursor: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<String>) -> Self {
        Self {
            script,
            cursor: Mutex::new(0),
        }
    }

    /// Backend that always answers with the same text
    pub fn constant(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()])
    }

    /// Number of generate calls served so far
    pub fn calls(&self) -> usize {
        *self.cursor.lock()
    }
}

#[async_trait]
impl LanguageModel for ScriptedBackend {
    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
        let mut cursor = self.cursor.lock();
        let index = *cursor;
        *cursor += 1;
        match self.script.get(index.min(self.script.len().saturating_sub(1))) {
            Some(text) if !self.script.is_empty() => Ok(text.clone()),
            _ => Ok(prompt.to_string()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Backend that always fails, for exercising degraded paths
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingBackend;

#[async_trait]
impl LanguageModel for FailingBackend {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(Error::Llm("backend unavailable".into()))
    }

    async fn is_available(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}
