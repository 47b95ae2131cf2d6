//! The notification projection: one immutable [`NotificationRecord`] per
//! unique `event_id`, covering the three outcome events a human actually
//! cares about.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// No external user-profile lookup is in scope (the notification service
/// has no cross-service read access to ingress's `uploaded_by` column), so
/// every simulated notification addresses this fixed placeholder.
pub const FALLBACK_RECIPIENT: &str = "document-owner@notifications.local";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    pub channel: String,
    pub correlation_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Renders the subject/message pair for one outcome event type. Returns
/// `None` for event types this observer doesn't address a notification to.
pub fn render(event_type: &str, aggregate_id: Uuid, payload: &serde_json::Value) -> Option<(String, String)> {
    match event_type {
        "DocumentValidated" => Some((
            "Your document passed validation".to_string(),
            format!("Document {aggregate_id} passed validation and is moving to enrichment."),
        )),
        "DocumentRejected" => {
            let reason = payload
                .get("rejectionReason")
                .and_then(|v| v.as_str())
                .unwrap_or("unspecified reason");
            Some((
                "Your document was rejected".to_string(),
                format!("Document {aggregate_id} was rejected: {reason}."),
            ))
        }
        "DocumentEnriched" => Some((
            "Your document is ready".to_string(),
            format!("Document {aggregate_id} finished enrichment and is ready."),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_message_includes_the_reason() {
        let aggregate_id = Uuid::new_v4();
        let payload = serde_json::json!({ "rejectionReason": "unsupported content type" });
        let (_, message) = render("DocumentRejected", aggregate_id, &payload).unwrap();
        assert!(message.contains("unsupported content type"));
    }

    #[test]
    fn unknown_event_type_renders_nothing() {
        assert!(render("DocumentUploaded", Uuid::new_v4(), &serde_json::json!({})).is_none());
    }
}
