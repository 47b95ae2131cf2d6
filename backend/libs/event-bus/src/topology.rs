//! Broker topology declaration.
//!
//! One durable topic exchange (`doc.events`) carries every integration
//! event; one durable direct exchange (`doc.dlx`) receives anything a main
//! queue dead-letters. Each stage declares its own main queue plus a DLQ,
//! both idempotently — any instance may run this on startup.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};

use crate::error::EventBusResult;

pub const EVENTS_EXCHANGE: &str = "doc.events";
pub const DLX_EXCHANGE: &str = "doc.dlx";

/// Declares a stage's main queue (bound to `doc.events` by one or more
/// routing keys) plus its dead-letter queue (bound to `doc.dlx`).
#[derive(Debug, Clone)]
pub struct QueueSpec {
    /// Main queue name, e.g. `document.validated.q`.
    pub queue: &'static str,
    /// Routing keys bound on `doc.events`; may include wildcards (`document.*`).
    pub bindings: &'static [&'static str],
    /// Optional message TTL in milliseconds (`queue.ttl`).
    pub ttl_ms: Option<i64>,
    /// Optional max queue length (`queue.maxLength`).
    pub max_length: Option<i64>,
}

impl QueueSpec {
    fn dlq_name(&self) -> String {
        format!("{}.dlq", self.queue)
    }

    fn dlq_routing_key(&self) -> String {
        self.dlq_name()
    }
}

/// The four stage queues named in the routing key table.
pub const DOCUMENT_UPLOADED_QUEUE: QueueSpec = QueueSpec {
    queue: "document.uploaded.q",
    bindings: &["document.uploaded"],
    ttl_ms: None,
    max_length: None,
};

pub const DOCUMENT_VALIDATED_QUEUE: QueueSpec = QueueSpec {
    queue: "document.validated.q",
    bindings: &["document.validated"],
    ttl_ms: None,
    max_length: None,
};

pub const DOCUMENT_AUDIT_QUEUE: QueueSpec = QueueSpec {
    queue: "document.audit.q",
    bindings: &["document.*"],
    ttl_ms: None,
    max_length: None,
};

pub const DOCUMENT_NOTIFICATION_QUEUE: QueueSpec = QueueSpec {
    queue: "document.notification.q",
    bindings: &["document.validated", "document.rejected", "document.enriched"],
    ttl_ms: None,
    max_length: None,
};

/// Declare `doc.events` (topic) and `doc.dlx` (direct). Safe to call from
/// every service instance; lapin's declare is idempotent when arguments
/// match.
pub async fn declare_exchanges(channel: &Channel) -> EventBusResult<()> {
    channel
        .exchange_declare(
            EVENTS_EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_declare(
            DLX_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    Ok(())
}

/// Declare one stage's main queue, its DLQ, and all bindings.
pub async fn declare_queue(channel: &Channel, spec: &QueueSpec) -> EventBusResult<()> {
    let dlq = spec.dlq_name();
    let dlq_routing_key = spec.dlq_routing_key();

    channel
        .queue_declare(
            &dlq,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            &dlq,
            DLX_EXCHANGE,
            &dlq_routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(DLX_EXCHANGE.into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(dlq_routing_key.clone().into()),
    );
    if let Some(ttl) = spec.ttl_ms {
        args.insert("x-message-ttl".into(), AMQPValue::LongLongInt(ttl));
    }
    if let Some(max_length) = spec.max_length {
        args.insert("x-max-length".into(), AMQPValue::LongLongInt(max_length));
    }

    channel
        .queue_declare(
            spec.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            args,
        )
        .await?;

    for routing_key in spec.bindings {
        channel
            .queue_bind(
                spec.queue,
                EVENTS_EXCHANGE,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_naming_is_derived_from_queue_name() {
        assert_eq!(DOCUMENT_VALIDATED_QUEUE.dlq_name(), "document.validated.q.dlq");
        assert_eq!(
            DOCUMENT_VALIDATED_QUEUE.dlq_routing_key(),
            "document.validated.q.dlq"
        );
    }

    #[test]
    fn audit_queue_binds_on_wildcard() {
        assert_eq!(DOCUMENT_AUDIT_QUEUE.bindings, &["document.*"]);
    }

    #[test]
    fn notification_queue_binds_on_three_outcome_keys() {
        assert_eq!(
            DOCUMENT_NOTIFICATION_QUEUE.bindings,
            &["document.validated", "document.rejected", "document.enriched"]
        );
    }
}
