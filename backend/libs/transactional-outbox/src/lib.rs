//! # Transactional Outbox Pattern Implementation
//!
//! This library implements the Transactional Outbox pattern used to publish
//! domain events reliably from a service that also owns a relational store.
//! It guarantees that a business write and the corresponding event record
//! land in the database atomically, and that delivery to the broker is
//! decoupled from that commit.
//!
//! ## What is the Transactional Outbox Pattern?
//!
//! 1. A business write and an [`OutboxRecord`] insert happen in one
//!    transaction (see [`OutboxRepository::insert`]).
//! 2. A background [`OutboxProcessor`] drains `PENDING` rows and publishes
//!    them through an [`OutboxPublisher`].
//! 3. A row is marked `SENT` only after the publisher confirms delivery.
//!
//! This guarantees **at-least-once delivery** even if the service crashes
//! between commit and publish, or the broker is briefly unavailable.
//!
//! ## Usage Example
//!
//! ### 1. Insert the business row and the outbox row in one transaction
//!
//! ```rust,no_run
//! use transactional_outbox::{OutboxRecord, OutboxRepository, SqlxOutboxRepository};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! async fn create_document(
//!     pool: &PgPool,
//!     outbox: &SqlxOutboxRepository,
//!     name: String,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!
//!     let document_id = Uuid::new_v4();
//!     sqlx::query("INSERT INTO documents (id, name) VALUES ($1, $2)")
//!         .bind(document_id)
//!         .bind(&name)
//!         .execute(&mut *tx)
//!         .await?;
//!
//!     let record = OutboxRecord::new(
//!         "document",
//!         document_id,
//!         "DocumentUploaded",
//!         serde_json::json!({ "documentName": name }),
//!     );
//!     outbox.insert(&mut tx, &record).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### 2. Run the publisher loop
//!
//! ```rust,no_run
//! use transactional_outbox::{OutboxProcessor, SqlxOutboxRepository, OutboxPublisher, OutboxRecord, OutboxResult, BackoffConfig};
//! use async_trait::async_trait;
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! struct NullPublisher;
//!
//! #[async_trait]
//! impl OutboxPublisher for NullPublisher {
//!     async fn publish(&self, _record: &OutboxRecord) -> OutboxResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PgPool::connect_lazy("postgresql://localhost/mydb")?;
//!     let repository = Arc::new(SqlxOutboxRepository::new(pool));
//!     let publisher = Arc::new(NullPublisher);
//!
//!     let processor = OutboxProcessor::new(repository, publisher, 100, BackoffConfig::default());
//!     processor.start().await?;
//!     Ok(())
//! }
//! ```

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod error;
pub mod macros;
pub mod metrics;

pub use error::{OutboxError, OutboxResult};

/// Lifecycle state of an [`OutboxRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum OutboxStatus {
    /// Not yet delivered; eligible for a drain once `next_retry_at` passes.
    Pending,
    /// Delivered to the broker at least once.
    Sent,
    /// Retry ceiling reached (or a terminal publish error). Requires
    /// operator intervention (`outbox-cli replay-*`) to retry.
    Failed,
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Sent => "SENT",
            OutboxStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// A row in a service's outbox table.
///
/// Created inside the caller's business transaction via
/// [`OutboxRepository::insert`]; transitioned by the background
/// [`OutboxProcessor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Surrogate primary key, assigned by the database on insert.
    pub id: i64,

    /// Unique event identifier. Propagated to consumers as the idempotency
    /// key and to the broker as the message id.
    pub event_id: Uuid,

    /// Fully qualified event type (e.g. `"DocumentUploaded"`).
    pub event_type: String,

    /// Type of aggregate this event relates to (e.g. `"document"`).
    pub aggregate_type: String,

    /// ID of the aggregate this event relates to.
    pub aggregate_id: Uuid,

    /// Event payload as canonical JSON, stored and published byte-for-byte.
    pub payload: serde_json::Value,

    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Build a new `PENDING` record ready for [`OutboxRepository::insert`],
    /// generating a fresh `event_id`.
    ///
    /// Use [`Self::with_event_id`] instead whenever the same id must also be
    /// embedded in the event payload itself (e.g. the payload's `eventId`
    /// field) — the broker's `message-id` and the consumer ledger key are
    /// both derived from `event_id`, so the payload and the row must agree.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: Uuid,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_event_id(Uuid::new_v4(), aggregate_type, aggregate_id, event_type, payload)
    }

    /// Build a new `PENDING` record with a caller-supplied `event_id`.
    pub fn with_event_id(
        event_id: Uuid,
        aggregate_type: impl Into<String>,
        aggregate_id: Uuid,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: 0,
            event_id,
            event_type: event_type.into(),
            aggregate_type: aggregate_type.into(),
            aggregate_id,
            payload,
            status: OutboxStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            retry_count: 0,
            last_error: None,
            next_retry_at: None,
        }
    }
}

/// Truncate an error message to the column width used for `last_error`.
fn truncate_error(msg: &str) -> String {
    const MAX_LEN: usize = 500;
    if msg.len() <= MAX_LEN {
        msg.to_string()
    } else {
        format!("{}...", &msg[..MAX_LEN])
    }
}

/// Repository trait for managing outbox rows.
///
/// Abstracts database access so the processor can be tested against a fake
/// implementation.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Insert a new `PENDING` record within the caller's transaction.
    ///
    /// MUST be called inside the same transaction as the business write it
    /// accompanies.
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &OutboxRecord,
    ) -> OutboxResult<()>;

    /// Open a transaction for a drain tick.
    async fn begin(&self) -> OutboxResult<Transaction<'static, Postgres>>;

    /// Select up to `limit` drainable rows, locking them with
    /// `FOR UPDATE SKIP LOCKED` so concurrent publisher instances never
    /// claim the same row twice.
    async fn claim_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> OutboxResult<Vec<OutboxRecord>>;

    /// Mark a row `SENT`.
    async fn mark_sent(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> OutboxResult<()>;

    /// Reschedule a row after a transient publish failure.
    async fn mark_retry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> OutboxResult<()>;

    /// Move a row to the terminal `FAILED` state.
    async fn mark_failed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        error: &str,
    ) -> OutboxResult<()>;

    /// Pending count and oldest-pending age in seconds (0 if none pending).
    async fn pending_stats(&self) -> OutboxResult<(i64, i64)>;
}

/// SQLx/PostgreSQL implementation of [`OutboxRepository`].
pub struct SqlxOutboxRepository {
    pool: PgPool,
}

impl SqlxOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let rec = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds
            FROM outbox_events
            WHERE status = 'PENDING'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to compute outbox pending stats")?;

        let pending: i64 = rec.try_get("pending").unwrap_or(0);
        let age: i64 = rec.try_get("age_seconds").unwrap_or(0);
        Ok((pending, age))
    }

    /// Reset rows back to `PENDING` so the publisher drains them again.
    /// Operator tool, not exercised by normal processing.
    pub async fn replay_since(&self, ts: DateTime<Utc>) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'PENDING', retry_count = 0, last_error = NULL, next_retry_at = NULL
            WHERE created_at >= $1 AND status = 'FAILED'
            "#,
        )
        .bind(ts)
        .execute(&self.pool)
        .await
        .context("failed to replay events since timestamp")?;

        Ok(res.rows_affected())
    }

    /// Reset rows by `event_id` range (inclusive) back to `PENDING`.
    pub async fn replay_range(&self, from_id: Uuid, to_id: Uuid) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'PENDING', retry_count = 0, last_error = NULL, next_retry_at = NULL
            WHERE event_id BETWEEN $1 AND $2 AND status = 'FAILED'
            "#,
        )
        .bind(from_id)
        .bind(to_id)
        .execute(&self.pool)
        .await
        .context("failed to replay events by id range")?;

        Ok(res.rows_affected())
    }
}

#[async_trait]
impl OutboxRepository for SqlxOutboxRepository {
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &OutboxRecord,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                event_id, aggregate_type, aggregate_id, event_type, payload,
                status, created_at, sent_at, retry_count, last_error, next_retry_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.event_id)
        .bind(&record.aggregate_type)
        .bind(record.aggregate_id)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.status)
        .bind(record.created_at)
        .bind(record.sent_at)
        .bind(record.retry_count)
        .bind(&record.last_error)
        .bind(record.next_retry_at)
        .execute(&mut **tx)
        .await
        .context("failed to insert outbox record")?;

        debug!(
            event_id = %record.event_id,
            event_type = %record.event_type,
            aggregate_id = %record.aggregate_id,
            "outbox record inserted"
        );

        Ok(())
    }

    async fn begin(&self) -> OutboxResult<Transaction<'static, Postgres>> {
        Ok(self
            .pool
            .begin()
            .await
            .context("failed to start outbox drain transaction")?)
    }

    async fn claim_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> OutboxResult<Vec<OutboxRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, aggregate_type, aggregate_id, event_type, payload,
                   status, created_at, sent_at, retry_count, last_error, next_retry_at
            FROM outbox_events
            WHERE status = 'PENDING' AND (next_retry_at IS NULL OR next_retry_at <= NOW())
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&mut **tx)
        .await
        .context("failed to claim outbox batch")?;

        let records = rows
            .into_iter()
            .map(|row| {
                Ok(OutboxRecord {
                    id: row.try_get("id")?,
                    event_id: row.try_get("event_id")?,
                    aggregate_type: row.try_get("aggregate_type")?,
                    aggregate_id: row.try_get("aggregate_id")?,
                    event_type: row.try_get("event_type")?,
                    payload: row.try_get("payload")?,
                    status: row.try_get("status")?,
                    created_at: row.try_get("created_at")?,
                    sent_at: row.try_get("sent_at")?,
                    retry_count: row.try_get("retry_count")?,
                    last_error: row.try_get("last_error")?,
                    next_retry_at: row.try_get("next_retry_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("failed to decode claimed outbox rows")?;

        Ok(records)
    }

    async fn mark_sent(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> OutboxResult<()> {
        sqlx::query(
            r#"UPDATE outbox_events SET status = 'SENT', sent_at = NOW(), last_error = NULL, next_retry_at = NULL WHERE id = $1"#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await
        .context("failed to mark outbox record sent")?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = retry_count + 1, last_error = $2, next_retry_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(truncate_error(error))
        .bind(next_retry_at)
        .execute(&mut **tx)
        .await
        .context("failed to reschedule outbox record")?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        error: &str,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'FAILED', retry_count = retry_count + 1, last_error = $2, next_retry_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(truncate_error(error))
        .execute(&mut **tx)
        .await
        .context("failed to fail outbox record")?;

        warn!(id, error, "outbox record moved to FAILED");
        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        SqlxOutboxRepository::pending_stats(self).await
    }
}

/// Publisher trait for delivering an [`OutboxRecord`] to the broker.
///
/// Implementations must be idempotent-safe on the receiving end: the
/// processor may publish the same row more than once across crash
/// recovery.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    async fn publish(&self, record: &OutboxRecord) -> OutboxResult<()>;
}

/// Exponential backoff parameters for the publisher's retry schedule.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: i32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(3600),
            max_retries: 10,
        }
    }
}

impl BackoffConfig {
    /// `next_retry_at = now + min(initial_delay * 2^(retry_count - 1), max_delay)`
    ///
    /// `retry_count` is the count *after* the failing attempt (1-indexed).
    fn delay_for(&self, retry_count: i32) -> Duration {
        let exponent = (retry_count - 1).max(0) as u32;
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let scaled_secs = self.initial_delay.as_secs().saturating_mul(factor);
        Duration::from_secs(scaled_secs.min(self.max_delay.as_secs()))
    }
}

/// Background processor that drains an outbox table to a broker.
///
/// Each tick opens one transaction, claims up to `batch_size` drainable
/// rows with `FOR UPDATE SKIP LOCKED`, attempts to publish each, and
/// transitions every claimed row before committing. Running multiple
/// instances concurrently is safe: the skip-locked select is the only
/// coordination mechanism required.
pub struct OutboxProcessor<R: OutboxRepository, P: OutboxPublisher> {
    repository: Arc<R>,
    publisher: Arc<P>,
    batch_size: i64,
    poll_interval: Duration,
    backoff: BackoffConfig,
    metrics: Option<crate::metrics::OutboxMetrics>,
}

impl<R: OutboxRepository, P: OutboxPublisher> OutboxProcessor<R, P> {
    pub fn new(repository: Arc<R>, publisher: Arc<P>, batch_size: i64, backoff: BackoffConfig) -> Self {
        Self {
            repository,
            publisher,
            batch_size,
            poll_interval: Duration::from_secs(2),
            backoff,
            metrics: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_metrics(mut self, metrics: crate::metrics::OutboxMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the drain loop forever. Spawn as a background task per worker.
    pub async fn start(&self) -> OutboxResult<()> {
        info!(
            batch_size = self.batch_size,
            poll_interval_secs = self.poll_interval.as_secs(),
            max_retries = self.backoff.max_retries,
            "outbox processor starting"
        );

        loop {
            match self.process_batch().await {
                Ok(count) if count > 0 => info!(published_count = count, "drained outbox batch"),
                Ok(_) => debug!("no outbox rows to drain"),
                Err(e) => error!(error = ?e, "outbox drain tick failed"),
            }

            if let Some(metrics) = &self.metrics {
                if let Ok((pending, age)) = self.repository.pending_stats().await {
                    metrics.pending.set(pending);
                    metrics.oldest_pending_age_seconds.set(age);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Run exactly one drain tick. Exposed for tests and for callers that
    /// want to control their own scheduling loop.
    pub async fn process_batch(&self) -> OutboxResult<i32> {
        let mut tx = self.repository.begin().await?;
        let rows = self.repository.claim_batch(&mut tx, self.batch_size).await?;

        let mut published_count = 0;
        for row in rows {
            match self.publisher.publish(&row).await {
                Ok(()) => {
                    self.repository.mark_sent(&mut tx, row.id).await?;
                    published_count += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.published.inc();
                    }
                }
                Err(OutboxError::PublishTerminal(msg)) => {
                    error!(event_id = %row.event_id, error = %msg, "terminal publish failure");
                    self.repository.mark_failed(&mut tx, row.id, &msg).await?;
                }
                Err(e) => {
                    let next_retry_count = row.retry_count + 1;
                    if next_retry_count >= self.backoff.max_retries {
                        warn!(
                            event_id = %row.event_id,
                            retry_count = next_retry_count,
                            max_retries = self.backoff.max_retries,
                            "retry ceiling reached, moving to FAILED"
                        );
                        self.repository.mark_failed(&mut tx, row.id, &e.to_string()).await?;
                    } else {
                        let delay = self.backoff.delay_for(next_retry_count);
                        let next_retry_at = Utc::now()
                            + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                        warn!(
                            event_id = %row.event_id,
                            retry_count = next_retry_count,
                            delay_secs = delay.as_secs(),
                            error = %e,
                            "publish failed, rescheduling"
                        );
                        self.repository
                            .mark_retry(&mut tx, row.id, &e.to_string(), next_retry_at)
                            .await?;
                    }
                }
            }
        }

        tx.commit().await.context("failed to commit outbox drain tick")?;
        Ok(published_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let backoff = BackoffConfig::default();
        assert_eq!(backoff.delay_for(1).as_secs(), 10);
        assert_eq!(backoff.delay_for(2).as_secs(), 20);
        assert_eq!(backoff.delay_for(3).as_secs(), 40);
        assert_eq!(backoff.delay_for(9).as_secs(), 2560);
        assert_eq!(backoff.delay_for(10).as_secs(), 3600); // capped
        assert_eq!(backoff.delay_for(20).as_secs(), 3600); // still capped
    }

    #[test]
    fn test_truncate_error() {
        let short = "connection refused";
        assert_eq!(truncate_error(short), short);

        let long = "x".repeat(600);
        let truncated = truncate_error(&long);
        assert!(truncated.len() <= 503);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_outbox_record_new_defaults() {
        let record = OutboxRecord::new(
            "document",
            Uuid::new_v4(),
            "DocumentUploaded",
            serde_json::json!({ "documentName": "r.pdf" }),
        );
        assert_eq!(record.status, OutboxStatus::Pending);
        assert_eq!(record.retry_count, 0);
        assert!(record.sent_at.is_none());
        assert!(record.next_retry_at.is_none());
    }
}
