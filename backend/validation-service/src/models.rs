//! Event payloads the validation stage emits. Both carry the base envelope
//! fields plus their own extra fields, per the canonical event format.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentValidatedPayload {
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
    #[serde(rename = "aggregateId")]
    pub aggregate_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "validationResult")]
    pub validation_result: &'static str,
    #[serde(rename = "validatedBy")]
    pub validated_by: &'static str,
}

impl DocumentValidatedPayload {
    pub fn new(event_id: Uuid, aggregate_id: Uuid, correlation_id: &str) -> Self {
        Self {
            event_id,
            event_type: "DocumentValidated",
            aggregate_id,
            timestamp: Utc::now(),
            correlation_id: correlation_id.to_string(),
            validation_result: "PASSED",
            validated_by: "validation-service",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRejectedPayload {
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
    #[serde(rename = "aggregateId")]
    pub aggregate_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "rejectionReason")]
    pub rejection_reason: String,
    #[serde(rename = "failedValidationRule")]
    pub failed_validation_rule: &'static str,
}

impl DocumentRejectedPayload {
    pub fn new(event_id: Uuid, aggregate_id: Uuid, correlation_id: &str, reason: String) -> Self {
        let failed_validation_rule = if reason.contains("blank") {
            "name_non_blank"
        } else if reason.contains("bound") {
            "name_length"
        } else if reason.contains("content type") {
            "content_type"
        } else if reason.contains("extension") {
            "name_extension"
        } else {
            "unknown"
        };

        Self {
            event_id,
            event_type: "DocumentRejected",
            aggregate_id,
            timestamp: Utc::now(),
            correlation_id: correlation_id.to_string(),
            rejection_reason: reason,
            failed_validation_rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_payload_classifies_length_failures() {
        let payload = DocumentRejectedPayload::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "c-1",
            "document name length 31 exceeds the 30-character bound".to_string(),
        );
        assert_eq!(payload.failed_validation_rule, "name_length");
    }
}
