//! Alerting hooks
//!
//! The core raises events; delivery (Slack, email, whatever) belongs to an
//! external component that implements `AlertSink`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Operator-facing events raised by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertEvent {
    /// A language model call failed after retries
    LlmFailure {
        creator_id: String,
        detail: String,
    },
    /// A follower explicitly asked for a human
    Escalation {
        creator_id: String,
        follower_id: String,
        message: String,
    },
    /// The guardrail rejected a generated response
    GuardrailRejection {
        creator_id: String,
        issues: Vec<String>,
    },
}

/// Alert delivery seam
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver an event. Failures are the sink's problem; the pipeline
    /// never blocks on alerting.
    async fn notify(&self, event: AlertEvent);
}

/// Sink that drops everything, used when no alerting is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAlertSink;

#[async_trait]
impl AlertSink for NullAlertSink {
    async fn notify(&self, event: AlertEvent) {
        tracing::debug!(?event, "alert dropped (no sink configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_sink_accepts_events() {
        let sink = NullAlertSink;
        sink.notify(AlertEvent::LlmFailure {
            creator_id: "c1".into(),
            detail: "connection refused".into(),
        })
        .await;
    }
}
