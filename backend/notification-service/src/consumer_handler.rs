//! The notification observer's [`MessageHandler`]: consumes
//! `document.validated`, `document.rejected`, `document.enriched`,
//! simulates sending a message, and writes one
//! [`crate::models::NotificationRecord`] per unique `event_id`. Like
//! audit, the unique constraint on `event_id` is the idempotency check —
//! there is no separate `processed_events` ledger.

use event_bus::{HandlerOutcome, InboundMessage, MessageHandler};
use sqlx::PgPool;

use crate::models::{render, FALLBACK_RECIPIENT};

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.code().as_deref() == Some("23505"))
        .unwrap_or(false)
}

pub struct NotificationHandler {
    pool: PgPool,
}

impl NotificationHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageHandler for NotificationHandler {
    async fn handle(&self, message: &InboundMessage) -> HandlerOutcome {
        let Some(aggregate_id) = message.aggregate_id else {
            return HandlerOutcome::TransientFailure(anyhow::anyhow!(
                "message carries no aggregateId header"
            ));
        };
        let event_type = message.event_type.clone().unwrap_or_default();

        let Some((subject, body)) = render(&event_type, aggregate_id, &message.payload) else {
            tracing::debug!(event_type = %event_type, "no notification rendered for this event type");
            return HandlerOutcome::Handled;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO notification_records (event_id, aggregate_id, recipient, subject, message, channel, correlation_id, sent_at)
            VALUES ($1, $2, $3, $4, $5, 'email', $6, NOW())
            "#,
        )
        .bind(message.event_id)
        .bind(aggregate_id)
        .bind(FALLBACK_RECIPIENT)
        .bind(&subject)
        .bind(&body)
        .bind(&message.correlation_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    event_id = %message.event_id,
                    aggregate_id = %aggregate_id,
                    event_type = %event_type,
                    "notification sent"
                );
                HandlerOutcome::Handled
            }
            Err(e) if is_duplicate_key(&e) => {
                tracing::info!(event_id = %message.event_id, "duplicate delivery, notification already sent");
                HandlerOutcome::Handled
            }
            Err(e) => HandlerOutcome::TransientFailure(anyhow::anyhow!(e)),
        }
    }
}
