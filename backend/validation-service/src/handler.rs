//! The validation stage's [`MessageHandler`]: consumes `document.uploaded`,
//! applies the business rules in [`crate::validator`], and emits
//! `DocumentValidated` or `DocumentRejected` — both business-terminal
//! outcomes per the failure classifier.

use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{HandlerOutcome, InboundMessage, MessageHandler};
use idempotent_consumer::IdempotencyGuard;
use sqlx::PgPool;
use transactional_outbox::{OutboxRecord, OutboxRepository, SqlxOutboxRepository};
use uuid::Uuid;

use crate::models::{DocumentRejectedPayload, DocumentValidatedPayload};
use crate::validator::validate;

pub struct ValidationHandler {
    pool: PgPool,
    idempotency: IdempotencyGuard,
    outbox: Arc<SqlxOutboxRepository>,
}

impl ValidationHandler {
    pub fn new(pool: PgPool, outbox: Arc<SqlxOutboxRepository>) -> Self {
        Self {
            idempotency: IdempotencyGuard::new(pool.clone()),
            pool,
            outbox,
        }
    }
}

#[async_trait]
impl MessageHandler for ValidationHandler {
    async fn handle(&self, message: &InboundMessage) -> HandlerOutcome {
        match self.idempotency.is_processed(message.event_id).await {
            Ok(true) => {
                tracing::info!(event_id = %message.event_id, "duplicate delivery, skipping");
                return HandlerOutcome::Handled;
            }
            Ok(false) => {}
            Err(e) => return HandlerOutcome::TransientFailure(anyhow::anyhow!(e)),
        }

        let Some(aggregate_id) = message.aggregate_id else {
            return HandlerOutcome::TransientFailure(anyhow::anyhow!(
                "message carries no aggregateId header"
            ));
        };

        let document_name = message.payload.get("documentName").and_then(|v| v.as_str());
        let content_type = message.payload.get("contentType").and_then(|v| v.as_str());
        let (document_name, content_type) = match (document_name, content_type) {
            (Some(n), Some(c)) => (n.to_string(), c.to_string()),
            _ => {
                return HandlerOutcome::TransientFailure(anyhow::anyhow!(
                    "payload missing documentName or contentType"
                ))
            }
        };
        let correlation_id = message.correlation_id.clone().unwrap_or_default();

        let event_id = Uuid::new_v4();
        let (event_type, payload) = match validate(&document_name, &content_type) {
            Ok(()) => {
                let payload = DocumentValidatedPayload::new(event_id, aggregate_id, &correlation_id);
                ("DocumentValidated", serde_json::to_value(&payload))
            }
            Err(reason) => {
                let payload =
                    DocumentRejectedPayload::new(event_id, aggregate_id, &correlation_id, reason);
                ("DocumentRejected", serde_json::to_value(&payload))
            }
        };
        let payload = match payload {
            Ok(p) => p,
            Err(e) => return HandlerOutcome::TransientFailure(anyhow::anyhow!(e)),
        };

        let record = OutboxRecord::with_event_id(event_id, "document", aggregate_id, event_type, payload);

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return HandlerOutcome::TransientFailure(anyhow::anyhow!(e)),
        };

        if let Err(e) = self
            .idempotency
            .mark_processed_in(&mut tx, message.event_id, "DocumentUploaded", aggregate_id)
            .await
        {
            if e.is_duplicate_key() {
                tracing::info!(event_id = %message.event_id, "lost idempotency race, skipping");
                return HandlerOutcome::Handled;
            }
            return HandlerOutcome::TransientFailure(anyhow::anyhow!(e));
        }

        if let Err(e) = self.outbox.insert(&mut tx, &record).await {
            return HandlerOutcome::TransientFailure(anyhow::anyhow!(e));
        }

        if let Err(e) = tx.commit().await {
            return HandlerOutcome::TransientFailure(anyhow::anyhow!(e));
        }

        tracing::info!(
            event_id = %message.event_id,
            aggregate_id = %aggregate_id,
            event_type,
            "document validated"
        );
        HandlerOutcome::Handled
    }
}
