//! The document aggregate and the `DocumentUploaded` event payload this
//! stage emits. Ingress is the only stage that creates the aggregate; every
//! other stage's view of a document is a projection derived from events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document row as owned by ingress. `status` starts at `Uploaded` and is
/// never advanced here; downstream outcomes live only in the audit and
/// notification projections, per the data model's ownership rule.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub file_size: i64,
    pub metadata: Option<serde_json::Value>,
    pub uploaded_by: Option<String>,
    pub status: String,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

/// `POST /documents` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(rename = "fileSize")]
    pub file_size: i64,
    pub metadata: Option<serde_json::Value>,
    #[serde(rename = "uploadedBy")]
    pub uploaded_by: Option<String>,
}

/// `POST /documents` / `GET /documents/{id}` response body.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(rename = "fileSize")]
    pub file_size: i64,
    pub metadata: Option<serde_json::Value>,
    pub status: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            content_type: doc.content_type,
            file_size: doc.file_size,
            metadata: doc.metadata,
            status: doc.status,
            correlation_id: doc.correlation_id,
            created_at: doc.created_at,
        }
    }
}

/// The `DocumentUploaded` event payload, per the canonical event format:
/// the base envelope fields plus this event's extra fields.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentUploadedPayload {
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
    #[serde(rename = "aggregateId")]
    pub aggregate_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "documentName")]
    pub document_name: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(rename = "fileSize")]
    pub file_size: i64,
}

impl DocumentUploadedPayload {
    pub fn new(event_id: Uuid, document: &Document) -> Self {
        Self {
            event_id,
            event_type: "DocumentUploaded",
            aggregate_id: document.id,
            timestamp: Utc::now(),
            correlation_id: document.correlation_id.clone(),
            document_name: document.name.clone(),
            content_type: document.content_type.clone(),
            file_size: document.file_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_payload_serializes_with_canonical_field_names() {
        let document = Document {
            id: Uuid::new_v4(),
            name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            file_size: 1024,
            metadata: None,
            uploaded_by: None,
            status: "UPLOADED".to_string(),
            correlation_id: "c-1".to_string(),
            created_at: Utc::now(),
        };
        let payload = DocumentUploadedPayload::new(Uuid::new_v4(), &document);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["eventType"], "DocumentUploaded");
        assert_eq!(json["documentName"], "report.pdf");
        assert_eq!(json["contentType"], "application/pdf");
        assert_eq!(json["correlationId"], "c-1");
    }
}
