//! The five-way error taxonomy every stage classifies its failures into.
//!
//! Classification determines whether a message is retried locally, parked
//! in the dead-letter queue, acknowledged via a rejection event, or left
//! for operator intervention. Getting the classification wrong either loops
//! forever on a payload that will never pass, or silently drops a message
//! that would have succeeded on retry.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The broker message itself is unusable: missing `event_id` or a body
    /// that doesn't parse as JSON. Local retries will all fail identically;
    /// goes to the DLQ for operator inspection.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The payload parsed fine but a stage-level business rule rejected
    /// it. Terminal: the handler emits a rejection event and acknowledges.
    /// Never reaches the DLQ.
    #[error("business rejection: {0}")]
    BusinessRejection(String),

    /// Database unavailable, broker congestion, or a reference that is
    /// temporarily unresolvable. Retried locally in the consumer; in the
    /// publisher, rescheduled via outbox backoff.
    #[error("transient technical failure: {0}")]
    TransientTechnical(String),

    /// The outbox publisher exhausted its retry ceiling for this row. The
    /// row is now `FAILED`; nothing retries it automatically.
    #[error("permanent publish failure: {0}")]
    PermanentPublishFailure(String),

    /// The broker could not route the message at all (e.g. to a queue with
    /// no matching binding). Never reaches a handler; a broker-level
    /// concern surfaced here only for completeness of the taxonomy.
    #[error("poison message: {0}")]
    Poison(String),
}

impl PipelineError {
    /// Whether this classification should be retried by the local
    /// interceptor before falling through to the DLQ.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientTechnical(_))
    }

    /// Whether this classification is terminal for the *message* (no
    /// amount of retrying changes the outcome), as opposed to terminal for
    /// the *row* ([`Self::PermanentPublishFailure`], which is a publisher
    /// concern, not a consumer one).
    pub fn is_terminal_for_handler(&self) -> bool {
        matches!(self, Self::InvalidEnvelope(_) | Self::BusinessRejection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_technical_is_retryable() {
        assert!(PipelineError::TransientTechnical("db down".into()).is_retryable());
        assert!(!PipelineError::InvalidEnvelope("bad".into()).is_retryable());
        assert!(!PipelineError::BusinessRejection("too long".into()).is_retryable());
        assert!(!PipelineError::PermanentPublishFailure("ceiling".into()).is_retryable());
        assert!(!PipelineError::Poison("unroutable".into()).is_retryable());
    }

    #[test]
    fn invalid_envelope_and_business_rejection_are_terminal_for_the_handler() {
        assert!(PipelineError::InvalidEnvelope("bad".into()).is_terminal_for_handler());
        assert!(PipelineError::BusinessRejection("too long".into()).is_terminal_for_handler());
        assert!(!PipelineError::TransientTechnical("db down".into()).is_terminal_for_handler());
    }
}
