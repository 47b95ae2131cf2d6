//! Extracts the per-message context the consumer runtime and handlers need
//! out of a raw `lapin` delivery, per the handler contract's first two
//! steps: pull `event_id` from the message identifier, then bind a logging
//! context from the envelope.

use lapin::message::Delivery;
use lapin::types::AMQPValue;
use uuid::Uuid;

use crate::error::EventBusError;

/// Everything a [`crate::consumer::MessageHandler`] needs about one
/// delivery, already validated and detached from the broker client.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub event_id: Uuid,
    pub event_type: Option<String>,
    pub aggregate_id: Option<Uuid>,
    pub correlation_id: Option<String>,
    pub routing_key: String,
    pub payload: serde_json::Value,
}

impl InboundMessage {
    /// Parses a delivery. Fails with [`EventBusError::InvalidEnvelope`] if
    /// the message carries no usable `event_id` or the body isn't valid
    /// JSON — both are handler-contract step 1/4 failures that must go
    /// straight to the DLQ, never through local retry.
    pub fn from_delivery(delivery: &Delivery) -> Result<Self, EventBusError> {
        let properties = &delivery.properties;

        let event_id = properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str())
            .ok_or_else(|| EventBusError::InvalidEnvelope("missing message-id".to_string()))
            .and_then(|id| {
                Uuid::parse_str(id)
                    .map_err(|e| EventBusError::InvalidEnvelope(format!("invalid message-id: {e}")))
            })?;

        let headers = properties.headers().clone().unwrap_or_default();

        let event_type = header_str(&headers, "eventType");
        let correlation_id = properties
            .correlation_id()
            .as_ref()
            .map(|v| v.as_str().to_string())
            .or_else(|| header_str(&headers, "correlationId"));
        let aggregate_id = header_str(&headers, "aggregateId")
            .and_then(|raw| Uuid::parse_str(&raw).ok());

        let payload: serde_json::Value = serde_json::from_slice(&delivery.data)
            .map_err(|e| EventBusError::InvalidEnvelope(format!("malformed JSON body: {e}")))?;

        Ok(Self {
            event_id,
            event_type,
            aggregate_id,
            correlation_id,
            routing_key: delivery.routing_key.to_string(),
            payload,
        })
    }
}

fn header_str(headers: &lapin::types::FieldTable, key: &str) -> Option<String> {
    match headers.inner().get(key) {
        Some(AMQPValue::LongString(s)) => Some(s.to_string()),
        Some(AMQPValue::ShortString(s)) => Some(s.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::{AMQPValue, FieldTable};

    #[test]
    fn header_str_reads_long_string_values() {
        let mut headers = FieldTable::default();
        headers.insert("eventType".into(), AMQPValue::LongString("DocumentValidated".into()));
        assert_eq!(header_str(&headers, "eventType"), Some("DocumentValidated".to_string()));
    }

    #[test]
    fn header_str_is_none_for_missing_key() {
        let headers = FieldTable::default();
        assert_eq!(header_str(&headers, "eventType"), None);
    }
}
