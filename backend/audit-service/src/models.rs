//! The audit projection: one immutable [`AuditRecord`] per unique
//! `event_id`, decoded only down to the common envelope fields per the
//! observer-stage rule — audit never builds the producing side's tagged
//! union, since it has no business logic keyed on event-specific fields.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditRecord {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub routing_key: String,
    pub correlation_id: Option<String>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// One entry in an aggregate's chronological timeline.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimelineEntry {
    pub event_id: Uuid,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
}

/// Per-`eventType` counts, for the aggregate-counters endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EventTypeCount {
    pub event_type: String,
    pub count: i64,
}
