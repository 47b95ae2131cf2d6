//! Shared error types for the document processing pipeline: the internal
//! five-way failure taxonomy stages classify against ([`taxonomy`]), and the
//! HTTP error envelope the ingress/audit services return to callers
//! ([`http`]).

pub mod http;
pub mod taxonomy;

pub use http::{AppError, ErrorEnvelope};
pub use taxonomy::PipelineError;
