//! The audit observer's [`MessageHandler`]: consumes every `document.*`
//! routing key and writes one [`crate::models::AuditRecord`] per unique
//! `event_id`. Audit has no `processed_events` ledger of its own — the
//! unique constraint on `audit_records.event_id` *is* the idempotency
//! check, so a duplicate delivery surfaces as a constraint violation on
//! insert rather than a prior lookup.

use event_bus::{HandlerOutcome, InboundMessage, MessageHandler};
use sqlx::PgPool;

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.code().as_deref() == Some("23505"))
        .unwrap_or(false)
}

pub struct AuditHandler {
    pool: PgPool,
}

impl AuditHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageHandler for AuditHandler {
    async fn handle(&self, message: &InboundMessage) -> HandlerOutcome {
        let Some(aggregate_id) = message.aggregate_id else {
            return HandlerOutcome::TransientFailure(anyhow::anyhow!(
                "message carries no aggregateId header"
            ));
        };
        let event_type = message
            .event_type
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO audit_records (event_id, event_type, aggregate_id, routing_key, correlation_id, payload, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(message.event_id)
        .bind(&event_type)
        .bind(aggregate_id)
        .bind(&message.routing_key)
        .bind(&message.correlation_id)
        .bind(&message.payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    event_id = %message.event_id,
                    event_type = %event_type,
                    aggregate_id = %aggregate_id,
                    "audit record written"
                );
                HandlerOutcome::Handled
            }
            Err(e) if is_duplicate_key(&e) => {
                tracing::info!(event_id = %message.event_id, "duplicate delivery, audit record already exists");
                HandlerOutcome::Handled
            }
            Err(e) => HandlerOutcome::TransientFailure(anyhow::anyhow!(e)),
        }
    }
}
