//! Ingress stage: accepts document uploads over HTTP and writes the
//! aggregate plus its `DocumentUploaded` outbox row in one transaction.

pub mod config;
pub mod handlers;
pub mod models;

pub use config::Config;
