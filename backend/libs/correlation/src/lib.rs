//! # Correlation
//!
//! A single identifier, assigned at ingress, that follows a document
//! through every stage: persisted on the aggregate, embedded in every event
//! payload, carried on every broker message, and bound to the logging
//! context for the duration of each HTTP request or message handler.
//!
//! HTTP-facing services wrap their app with [`CorrelationIdMiddleware`],
//! which reads (or generates) the identifier and echoes it back on the
//! response. Broker consumers extract it from the message envelope
//! themselves (see `event_bus::envelope::InboundMessage`) since there is no
//! single shared entry point to hang middleware off of there.

pub mod id;
pub mod middleware;

pub use id::CorrelationId;
pub use middleware::{correlation_id_from_request, CorrelationIdMiddleware};

pub const HEADER_NAME: &str = "x-correlation-id";
