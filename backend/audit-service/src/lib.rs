//! Audit observer: consumes `document.*` via the wildcard binding and
//! exposes read-only query endpoints over the resulting projection.

pub mod config;
pub mod consumer_handler;
pub mod handlers;
pub mod models;

pub use config::Config;
pub use consumer_handler::AuditHandler;
