//! The enrichment stage's [`MessageHandler`]: consumes `document.validated`,
//! simulates enrichment, and emits `DocumentEnriched`. There is no rejection
//! branch here — enrichment has no business rule that can fail, only the
//! technical-failure path shared with every other stage.

use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{HandlerOutcome, InboundMessage, MessageHandler};
use idempotent_consumer::IdempotencyGuard;
use sqlx::PgPool;
use transactional_outbox::{OutboxRecord, OutboxRepository, SqlxOutboxRepository};
use uuid::Uuid;

use crate::models::DocumentEnrichedPayload;

pub struct EnrichmentHandler {
    pool: PgPool,
    idempotency: IdempotencyGuard,
    outbox: Arc<SqlxOutboxRepository>,
}

impl EnrichmentHandler {
    pub fn new(pool: PgPool, outbox: Arc<SqlxOutboxRepository>) -> Self {
        Self {
            idempotency: IdempotencyGuard::new(pool.clone()),
            pool,
            outbox,
        }
    }
}

#[async_trait]
impl MessageHandler for EnrichmentHandler {
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
        let correlation_id = message.correlation_id.clone().unwrap_or_default();

        let event_id = Uuid::new_v4();
        let payload = DocumentEnrichedPayload::new(event_id, aggregate_id, &correlation_id);
        let payload = match serde_json::to_value(&payload) {
            Ok(p) => p,
            Err(e) => return HandlerOutcome::TransientFailure(anyhow::anyhow!(e)),
        };
        let record =
            OutboxRecord::with_event_id(event_id, "document", aggregate_id, "DocumentEnriched", payload);

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return HandlerOutcome::TransientFailure(anyhow::anyhow!(e)),
        };

        if let Err(e) = self
            .idempotency
            .mark_processed_in(&mut tx, message.event_id, "DocumentValidated", aggregate_id)
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
            "document enriched"
        );
        HandlerOutcome::Handled
    }
}
