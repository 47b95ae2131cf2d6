//! The correlation identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one document's journey through the pipeline. Assigned at
/// ingress from an inbound `X-Correlation-Id` header if present, otherwise
/// generated fresh.
///
/// Per the canonical event format, this is "UUID or string" — any caller is
/// free to pass a human-chosen token (`"c-1"`, a trace id from an upstream
/// system, ...) and it propagates verbatim through every event, broker
/// message, and projection it touches. Only the *absence* of a header falls
/// back to a generated UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Any non-empty string is accepted; only a blank header value is rejected
/// (the caller falls back to [`CorrelationId::default`] in that case).
impl FromStr for CorrelationId {
    type Err = EmptyCorrelationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(EmptyCorrelationId);
        }
        Ok(Self(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("correlation id must not be blank")]
pub struct EmptyCorrelationId;

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let original = CorrelationId::new();
        let parsed: CorrelationId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn accepts_non_uuid_header_values_verbatim() {
        let parsed: CorrelationId = "c-1".parse().unwrap();
        assert_eq!(parsed.as_str(), "c-1");
    }

    #[test]
    fn rejects_a_blank_header_value() {
        assert!("   ".parse::<CorrelationId>().is_err());
    }
}
