//! Read-only query endpoints over the audit projection: thin projections
//! of [`crate::models::AuditRecord`] keyed by aggregate id, event id, and
//! event type, plus a chronological timeline and per-aggregate counters.

use actix_web::{web, HttpResponse};
use error_types::AppError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AuditRecord, EventTypeCount, TimelineEntry};

pub async fn get_by_event_id(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let event_id = path.into_inner();

    let record = sqlx::query_as::<_, AuditRecord>(
        r#"
        SELECT event_id, event_type, aggregate_id, routing_key, correlation_id, payload, received_at
        FROM audit_records WHERE event_id = $1
        "#,
    )
    .bind(event_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::NotFound(format!("audit record {event_id}")))?;

    Ok(HttpResponse::Ok().json(record))
}

pub async fn list_by_aggregate(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let aggregate_id = path.into_inner();

    let records = sqlx::query_as::<_, AuditRecord>(
        r#"
        SELECT event_id, event_type, aggregate_id, routing_key, correlation_id, payload, received_at
        FROM audit_records WHERE aggregate_id = $1
        ORDER BY received_at ASC
        "#,
    )
    .bind(aggregate_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(HttpResponse::Ok().json(records))
}

/// Chronological timeline for one aggregate: the same rows as
/// `list_by_aggregate`, projected down to `(event_id, event_type, received_at)`.
pub async fn timeline(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let aggregate_id = path.into_inner();

    let entries = sqlx::query_as::<_, TimelineEntry>(
        r#"
        SELECT event_id, event_type, received_at
        FROM audit_records WHERE aggregate_id = $1
        ORDER BY received_at ASC
        "#,
    )
    .bind(aggregate_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(HttpResponse::Ok().json(entries))
}

pub async fn list_by_event_type(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let event_type = path.into_inner();

    let records = sqlx::query_as::<_, AuditRecord>(
        r#"
        SELECT event_id, event_type, aggregate_id, routing_key, correlation_id, payload, received_at
        FROM audit_records WHERE event_type = $1
        ORDER BY received_at ASC
        "#,
    )
    .bind(event_type)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(HttpResponse::Ok().json(records))
}

/// Per-`eventType` counts for one aggregate.
pub async fn counters(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let aggregate_id = path.into_inner();

    let counts = sqlx::query_as::<_, EventTypeCount>(
        r#"
        SELECT event_type, COUNT(*) as count
        FROM audit_records WHERE aggregate_id = $1
        GROUP BY event_type
        "#,
    )
    .bind(aggregate_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(HttpResponse::Ok().json(counts))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
