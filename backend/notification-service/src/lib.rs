//! Notification observer: consumes `document.validated`, `document.rejected`,
//! and `document.enriched`, simulates sending a user-facing message, and
//! writes one [`models::NotificationRecord`] per unique `event_id`.

pub mod config;
pub mod consumer_handler;
pub mod models;

pub use config::Config;
pub use consumer_handler::NotificationHandler;
