//! Conversation-level analysis
//!
//! Runs the pattern-only tier of the classifier over every user turn and
//! rolls the counts up into a purchase-intent score and a funnel stage.
//! No model calls: this must stay cheap enough to run on every message.

use crate::intent::{Intent, IntentClassifier};
use dm_assistant_core::Turn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse sales-readiness of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunnelStage {
    Awareness,
    Interest,
    Consideration,
    Decision,
}

/// Aggregated view of one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    pub total_messages: usize,
    pub user_turns: usize,
    pub intent_distribution: HashMap<Intent, usize>,
    /// 0.0..=1.0, weighted tally of purchase-signal intents per user turn
    pub purchase_intent_score: f64,
    pub funnel_stage: FunnelStage,
    pub has_objections: bool,
    /// A follower who has sent several substantive turns
    pub is_engaged: bool,
    pub needs_support: bool,
}

/// Pattern-only conversation analyzer
#[derive(Debug, Default, Clone, Copy)]
pub struct ConversationAnalyzer;

impl ConversationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a full conversation history.
    ///
    /// Score = clamp01((3*strong + 1*soft + 2*product_q - 1*objection)
    /// / max(user_turns, 1) / 2). Stage thresholds: >0.7 decision,
    /// >0.4 consideration, >0.2 interest, else awareness.
    pub fn analyze(&self, turns: &[Turn]) -> ConversationAnalysis {
        let mut distribution: HashMap<Intent, usize> = HashMap::new();
        let mut user_turns = 0usize;

        for turn in turns.iter().filter(|t| t.is_user()) {
            user_turns += 1;
            if let Some(result) = IntentClassifier::fast_path(&turn.content) {
                *distribution.entry(result.intent).or_insert(0) += 1;
            }
        }

        let count = |intent: Intent| *distribution.get(&intent).unwrap_or(&0) as f64;
        let weighted = 3.0 * count(Intent::InterestStrong)
            + 1.0 * count(Intent::InterestSoft)
            + 2.0 * count(Intent::QuestionProduct)
            - 1.0 * count(Intent::Objection);
        let score = (weighted / user_turns.max(1) as f64 / 2.0).clamp(0.0, 1.0);

        let funnel_stage = if score > 0.7 {
            FunnelStage::Decision
        } else if score > 0.4 {
            FunnelStage::Consideration
        } else if score > 0.2 {
            FunnelStage::Interest
        } else {
            FunnelStage::Awareness
        };

        let has_objections = distribution.contains_key(&Intent::Objection);
        let needs_support = distribution.contains_key(&Intent::Support)
            || distribution.contains_key(&Intent::Escalation);

        ConversationAnalysis {
            total_messages: turns.len(),
            user_turns,
            intent_distribution: distribution,
            purchase_intent_score: score,
            funnel_stage,
            has_objections,
            is_engaged: user_turns >= 3,
            needs_support,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funnel_scoring_scenario() {
        let turns = vec![
            Turn::user("quiero comprar ya"),
            Turn::user("es muy caro"),
            Turn::user("cuánto cuesta"),
        ];
        let analysis = ConversationAnalyzer::new().analyze(&turns);

        assert_eq!(
            analysis.intent_distribution.get(&Intent::InterestStrong),
            Some(&1)
        );
        assert_eq!(analysis.intent_distribution.get(&Intent::Objection), Some(&1));
        assert_eq!(
            analysis.intent_distribution.get(&Intent::QuestionProduct),
            Some(&1)
        );

        // (3*1 + 2*1 - 1*1) / 3 / 2 = 4/6 ≈ 0.667
        assert!((analysis.purchase_intent_score - 4.0 / 6.0).abs() < 1e-9);
        assert_eq!(analysis.funnel_stage, FunnelStage::Consideration);
        assert!(analysis.has_objections);
        assert!(analysis.is_engaged);
        assert!(!analysis.needs_support);
    }

    #[test]
    fn test_empty_conversation_is_awareness() {
        let analysis = ConversationAnalyzer::new().analyze(&[]);
        assert_eq!(analysis.user_turns, 0);
        assert_eq!(analysis.purchase_intent_score, 0.0);
        assert_eq!(analysis.funnel_stage, FunnelStage::Awareness);
        assert!(!analysis.is_engaged);
    }

    #[test]
    fn test_assistant_turns_are_not_classified() {
        let turns = vec![
            Turn::user("hola"),
            Turn::assistant("quiero comprar ya"), // bot echo must not count
        ];
        let analysis = ConversationAnalyzer::new().analyze(&turns);
        assert_eq!(analysis.user_turns, 1);
        assert!(!analysis
            .intent_distribution
            .contains_key(&Intent::InterestStrong));
    }

    #[test]
    fn test_pure_decision_signal() {
        let turns = vec![Turn::user("quiero comprar ya"), Turn::user("dónde pago?")];
        let analysis = ConversationAnalyzer::new().analyze(&turns);
        // (3 + 3) / 2 / 2 = 1.5 clamped to 1.0
        assert_eq!(analysis.purchase_intent_score, 1.0);
        assert_eq!(analysis.funnel_stage, FunnelStage::Decision);
    }

    #[test]
    fn test_support_flag() {
        let turns = vec![Turn::user("no puedo acceder al curso")];
        let analysis = ConversationAnalyzer::new().analyze(&turns);
        assert!(analysis.needs_support);
    }
}
