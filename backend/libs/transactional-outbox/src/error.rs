//! Error types for the transactional outbox library.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Errors that can occur during outbox operations.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Database operation failed. Aborts the current drain tick; the next
    /// tick retries the same rows since nothing was committed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Event not found in outbox
    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    /// Publish attempt failed for a reason expected to clear on its own
    /// (broker unavailable, timeout, connection reset). Row is rescheduled
    /// with exponential backoff.
    #[error("Publish failed (transient): {0}")]
    PublishTransient(String),

    /// Publish attempt failed for a reason that will never succeed on retry
    /// (e.g. the row's event_type has no routing key mapping). Row moves to
    /// FAILED immediately regardless of retry_count.
    #[error("Publish failed (terminal): {0}")]
    PublishTerminal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error with context
    #[error("Outbox error: {0}")]
    Other(#[from] anyhow::Error),
}
