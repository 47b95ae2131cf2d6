//! Validation stage: consumes `document.uploaded`, applies the pipeline's
//! illustrative business rules, and emits `DocumentValidated` or
//! `DocumentRejected`.

pub mod config;
pub mod handler;
pub mod models;
pub mod validator;

pub use config::Config;
pub use handler::ValidationHandler;
