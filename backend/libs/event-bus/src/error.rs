//! Error types for the event bus library.

use thiserror::Error;

/// Result type alias for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Errors that can occur while talking to the broker.
#[derive(Error, Debug)]
pub enum EventBusError {
    /// Failed to obtain a channel from the connection pool.
    #[error("broker connection error: {0}")]
    Connection(#[from] deadpool_lapin::PoolError),

    /// A lapin operation (declare, publish, consume, ack) failed.
    #[error("broker channel error: {0}")]
    Channel(#[from] lapin::Error),

    /// Message payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The message carried no usable `event_id` (message-id property missing
    /// or not a valid UUID).
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Generic error with context.
    #[error("event bus error: {0}")]
    Other(#[from] anyhow::Error),
}

impl EventBusError {
    /// Whether this failure is expected to clear on its own (connection
    /// reset, broker unavailable) as opposed to a configuration mistake.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Channel(_))
    }
}
