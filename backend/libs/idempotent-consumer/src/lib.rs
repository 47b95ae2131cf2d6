//! # Idempotent Consumer
//!
//! Gives every consuming service exactly-once processing semantics on top
//! of an at-least-once broker, by recording `event_id` in a durable
//! `processed_events` ledger before a handler's side effects are visible.
//!
//! ## Problem
//!
//! At-least-once delivery means every consumer sees occasional duplicates:
//! broker redelivery after a missed ack, a crash between handler commit and
//! ack, or (for outbox publishers) a retry after a delivery that actually
//! succeeded. An in-memory dedupe set doesn't survive a restart or a second
//! consumer instance.
//!
//! ## Solution
//!
//! `processed_events` is keyed by `event_id` with a unique constraint. A
//! handler checks [`IdempotencyGuard::is_processed`] before doing any work,
//! and writes its ledger row in the same transaction as its side effects
//! (see [`IdempotencyGuard::mark_processed_in`]). Two concurrent deliveries
//! of the same event race on the `INSERT`; the loser sees a unique
//! violation and must treat it as a skip, not a failure.
//!
//! ## Concurrency Safety
//!
//! If N consumer instances process the same `event_id` concurrently, only
//! one `INSERT` succeeds; the rest observe
//! [`IdempotencyError::is_duplicate_key`] and should acknowledge without
//! reprocessing.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod error;

pub use error::{IdempotencyError, IdempotencyResult};

/// Outcome of [`IdempotencyGuard::process_if_new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    /// Event was processed for the first time.
    Success,
    /// Event was already in the ledger; no work was done.
    AlreadyProcessed,
    /// The processing closure returned an error.
    Failed(String),
}

impl ProcessingResult {
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            ProcessingResult::Success | ProcessingResult::AlreadyProcessed
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessingResult::Failed(_))
    }
}

/// A row in the `processed_events` ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub processed_at: DateTime<Utc>,
}

/// Idempotency guard backed by a per-service `processed_events` table.
///
/// Cheap to clone; holds only a connection pool.
#[derive(Clone)]
pub struct IdempotencyGuard {
    pool: PgPool,
}

impl IdempotencyGuard {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check whether `event_id` has already been recorded. Call this
    /// before doing any handler work; a positive result means the message
    /// should be acknowledged without side effects.
    pub async fn is_processed(&self, event_id: Uuid) -> IdempotencyResult<bool> {
        let result = sqlx::query(
            r#"SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1) AS exists"#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to check processed_events")?;

        let exists: bool = result.try_get("exists")?;
        if exists {
            debug!(%event_id, "event already processed");
        }
        Ok(exists)
    }

    /// Insert the ledger row inside the caller's transaction, atomically
    /// with whatever side effects (projection write, outbox insert) the
    /// handler performed. A unique violation here means a concurrent
    /// delivery won the race; callers should treat
    /// [`IdempotencyError::is_duplicate_key`] as a skip, not a failure.
    pub async fn mark_processed_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        event_type: &str,
        aggregate_id: Uuid,
    ) -> IdempotencyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, aggregate_id, processed_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(aggregate_id)
        .execute(&mut **tx)
        .await
        .context("failed to insert processed_events row")?;

        Ok(())
    }

    /// Pool-based variant of [`Self::mark_processed_in`] using
    /// `INSERT ... ON CONFLICT DO NOTHING`, for callers (observer stages)
    /// that have no other side effect needing the same transaction.
    ///
    /// Returns `true` if this call inserted the row (first delivery),
    /// `false` if it was already present (duplicate, handled idempotently).
    pub async fn mark_processed(
        &self,
        event_id: Uuid,
        event_type: &str,
        aggregate_id: Uuid,
    ) -> IdempotencyResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, aggregate_id, processed_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(aggregate_id)
        .execute(&self.pool)
        .await
        .context("failed to mark event processed")?;

        let was_inserted = result.rows_affected() > 0;
        if was_inserted {
            info!(%event_id, event_type, "event marked processed");
        } else {
            debug!(%event_id, "event already marked processed (duplicate)");
        }
        Ok(was_inserted)
    }

    /// Check-then-process-then-mark in one call, for handlers whose side
    /// effect has no other transactional resource to join.
    ///
    /// # Concurrency Safety
    ///
    /// If N consumers race on the same `event_id`, only one executes `f`;
    /// the ledger's unique constraint prevents the others from double
    /// counting even if they observe `is_processed() == false` at the same
    /// instant.
    pub async fn process_if_new<F, Fut>(
        &self,
        event_id: Uuid,
        event_type: &str,
        aggregate_id: Uuid,
        f: F,
    ) -> IdempotencyResult<ProcessingResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), anyhow::Error>>,
    {
        if self.is_processed(event_id).await? {
            return Ok(ProcessingResult::AlreadyProcessed);
        }

        match f().await {
            Ok(()) => {
                self.mark_processed(event_id, event_type, aggregate_id).await?;
                Ok(ProcessingResult::Success)
            }
            Err(e) => {
                warn!(%event_id, error = ?e, "event processing failed");
                Ok(ProcessingResult::Failed(e.to_string()))
            }
        }
    }

    /// Delete ledger rows older than `retention`. Intended to be called
    /// periodically (e.g. hourly) by a background task; the table would
    /// otherwise grow unbounded.
    pub async fn cleanup_old_events(&self, retention: Duration) -> IdempotencyResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention)
                .map_err(|e| IdempotencyError::Other(anyhow::anyhow!("invalid retention: {e}")))?;

        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("failed to cleanup processed_events")?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(deleted, %cutoff, "cleaned up old processed_events rows");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_result() {
        assert!(ProcessingResult::Success.is_ok());
        assert!(ProcessingResult::AlreadyProcessed.is_ok());
        assert!(!ProcessingResult::Failed("error".to_string()).is_ok());

        assert!(!ProcessingResult::Success.is_failed());
        assert!(!ProcessingResult::AlreadyProcessed.is_failed());
        assert!(ProcessingResult::Failed("error".to_string()).is_failed());
    }
}
