//! Prompt building
//!
//! Assembles the structured prompts used by intent classification and
//! the reasoning strategies.

use dm_assistant_core::Turn;

/// Builder for structured prompts
#[derive(Debug, Default)]
pub struct PromptBuilder {
    system: Option<String>,
    sections: Vec<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system = Some(instruction.into());
        self
    }

    /// Append a titled free-text section
    pub fn section(mut self, title: &str, body: impl AsRef<str>) -> Self {
        let body = body.as_ref().trim();
        if !body.is_empty() {
            self.sections.push(format!("## {title}\n{body}"));
        }
        self
    }

    /// Append the last `limit` turns of a conversation history
    pub fn history(mut self, turns: &[Turn], limit: usize) -> Self {
        if turns.is_empty() {
            return self;
        }
        let start = turns.len().saturating_sub(limit);
        let lines: Vec<String> = turns[start..]
            .iter()
            .map(|turn| {
                let who = if turn.is_user() { "Seguidor" } else { "Asistente" };
                format!("{who}: {}", turn.content)
            })
            .collect();
        self.sections
            .push(format!("## Historial reciente\n{}", lines.join("\n")));
        self
    }

    /// Render into a single prompt string
    pub fn build(self) -> String {
        let mut parts = Vec::new();
        if let Some(system) = self.system {
            parts.push(system);
        }
        parts.extend(self.sections);
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_in_order() {
        let prompt = PromptBuilder::new()
            .system("Eres un asistente de ventas")
            .section("Contexto", "Creadora de cursos de IA")
            .section("Mensaje", "cuánto cuesta?")
            .build();

        let context_pos = prompt.find("Contexto").unwrap();
        let message_pos = prompt.find("Mensaje").unwrap();
        assert!(context_pos < message_pos);
        assert!(prompt.starts_with("Eres un asistente"));
    }

    #[test]
    fn test_empty_sections_skipped() {
        let prompt = PromptBuilder::new().section("Contexto", "  ").build();
        assert!(!prompt.contains("Contexto"));
    }

    #[test]
    fn test_history_limit() {
        let turns: Vec<Turn> = (0..10).map(|i| Turn::user(format!("m{i}"))).collect();
        let prompt = PromptBuilder::new().history(&turns, 5).build();
        assert!(!prompt.contains("m4"));
        assert!(prompt.contains("m5"));
        assert!(prompt.contains("m9"));
    }
}
