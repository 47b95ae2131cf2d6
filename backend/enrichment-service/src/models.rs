//! The `DocumentEnriched` event payload this stage emits. Enrichment has
//! no rejection branch: the stage's only observable effect is simulated,
//! so every consumed `DocumentValidated` produces exactly one
//! `DocumentEnriched`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

const ENRICHMENT_TYPE: &str = "metadata-extraction";

#[derive(Debug, Clone, Serialize)]
pub struct DocumentEnrichedPayload {
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
    #[serde(rename = "aggregateId")]
    pub aggregate_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "enrichedAt")]
    pub enriched_at: DateTime<Utc>,
    #[serde(rename = "enrichmentType")]
    pub enrichment_type: &'static str,
}

impl DocumentEnrichedPayload {
    pub fn new(event_id: Uuid, aggregate_id: Uuid, correlation_id: &str) -> Self {
        let now = Utc::now();
        Self {
            event_id,
            event_type: "DocumentEnriched",
            aggregate_id,
            timestamp: now,
            correlation_id: correlation_id.to_string(),
            enriched_at: now,
            enrichment_type: ENRICHMENT_TYPE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enriched_payload_serializes_with_canonical_field_names() {
        let payload = DocumentEnrichedPayload::new(Uuid::new_v4(), Uuid::new_v4(), "c-1");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["eventType"], "DocumentEnriched");
        assert_eq!(json["enrichmentType"], "metadata-extraction");
        assert_eq!(json["correlationId"], "c-1");
        assert!(json.get("enrichedAt").is_some());
    }
}
