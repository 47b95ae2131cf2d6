//! HTTP error envelope for ingress/audit's actix-web surface.

use actix_web::{error::ResponseError, http::StatusCode, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types surfaced over HTTP.
#[derive(Debug)]
pub enum AppError {
    /// Database operation failed.
    Database(String),
    /// Request body failed validation; `field_errors` names the offending fields.
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },
    /// Resource not found.
    NotFound(String),
    /// Malformed request.
    BadRequest(String),
    /// Unexpected internal failure.
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {msg}"),
            AppError::Validation { message, .. } => write!(f, "Validation error: {message}"),
            AppError::NotFound(msg) => write!(f, "Not found: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Builds the `{error, message, status, path, timestamp, fieldErrors?}`
    /// envelope for a specific request path; use this from a handler that
    /// has an `HttpRequest` available. [`ResponseError::error_response`]
    /// falls back to an empty path when called outside a handler context.
    pub fn envelope(&self, path: &str) -> ErrorEnvelope {
        let field_errors = match self {
            AppError::Validation { field_errors, .. } => {
                (!field_errors.is_empty()).then(|| field_errors.clone())
            }
            _ => None,
        };

        ErrorEnvelope {
            error: self.status().canonical_reason().unwrap_or("error").to_string(),
            message: self.to_string(),
            status: self.status().as_u16(),
            path: path.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            field_errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub path: String,
    pub timestamp: String,
    #[serde(rename = "fieldErrors", skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, String>>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.envelope(""))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Convenience constructor for handlers that have the request path on hand
/// and want the fully-populated envelope rather than the empty-path
/// default `error_response` produces.
pub fn envelope_response(err: &AppError, req: &HttpRequest) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(err.envelope(req.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::NotFound("document 1".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_envelope_carries_field_errors() {
        let mut field_errors = HashMap::new();
        field_errors.insert("name".to_string(), "must not be blank".to_string());
        let err = AppError::Validation {
            message: "invalid request".into(),
            field_errors,
        };
        let envelope = err.envelope("/documents");
        assert_eq!(envelope.status, 400);
        assert!(envelope.field_errors.is_some());
    }

    #[test]
    fn non_validation_errors_omit_field_errors() {
        let err = AppError::NotFound("x".into());
        assert!(err.envelope("/documents/1").field_errors.is_none());
    }
}
