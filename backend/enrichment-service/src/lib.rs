//! Enrichment stage: consumes `document.validated` and emits
//! `DocumentEnriched`. The only stage with no rejection branch.

pub mod config;
pub mod handler;
pub mod models;

pub use config::Config;
pub use handler::EnrichmentHandler;
