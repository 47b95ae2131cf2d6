//! Broker-side implementation of [`transactional_outbox::OutboxPublisher`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_lapin::Pool;
use lapin::options::BasicPublishOptions;
use lapin::types::{AMQPValue, FieldTable};
use lapin::BasicProperties;
use resilience::timeout::with_timeout_result;
use transactional_outbox::{OutboxError, OutboxPublisher, OutboxRecord, OutboxResult};

use crate::routing::routing_key_for;
use crate::topology::EVENTS_EXCHANGE;

/// Publishes outbox rows to `doc.events` over a pooled AMQP connection.
///
/// Bounded by a per-attempt timeout so a wedged broker connection cannot
/// stall a drain tick forever; a timeout is reported as
/// [`OutboxError::PublishTransient`] so the row is rescheduled with backoff
/// rather than abandoned.
pub struct AmqpOutboxPublisher {
    pool: Pool,
    publish_timeout: Duration,
}

impl AmqpOutboxPublisher {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            publish_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    fn correlation_id(record: &OutboxRecord) -> Option<String> {
        record
            .payload
            .get("correlationId")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }

    async fn send(&self, record: &OutboxRecord, routing_key: &'static str) -> OutboxResult<()> {
        let channel = crate::pool::channel(&self.pool)
            .await
            .map_err(|e| OutboxError::PublishTransient(e.to_string()))?;

        let body = serde_json::to_vec(&record.payload)?;
        let correlation_id = Self::correlation_id(record);

        let mut headers = FieldTable::default();
        headers.insert(
            "eventType".into(),
            AMQPValue::LongString(record.event_type.clone().into()),
        );
        headers.insert(
            "aggregateType".into(),
            AMQPValue::LongString(record.aggregate_type.clone().into()),
        );
        headers.insert(
            "aggregateId".into(),
            AMQPValue::LongString(record.aggregate_id.to_string().into()),
        );
        if let Some(correlation_id) = &correlation_id {
            headers.insert(
                "correlationId".into(),
                AMQPValue::LongString(correlation_id.clone().into()),
            );
        }
        headers.insert(
            "publishedAt".into(),
            AMQPValue::LongString(Utc::now().to_rfc3339().into()),
        );

        let mut properties = BasicProperties::default()
            .with_message_id(record.event_id.to_string().into())
            .with_content_type("application/json".into())
            .with_headers(headers);
        if let Some(correlation_id) = correlation_id {
            properties = properties.with_correlation_id(correlation_id.into());
        }

        channel
            .basic_publish(
                EVENTS_EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| OutboxError::PublishTransient(e.to_string()))?
            .await
            .map_err(|e| OutboxError::PublishTransient(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl OutboxPublisher for AmqpOutboxPublisher {
    async fn publish(&self, record: &OutboxRecord) -> OutboxResult<()> {
        let routing_key = routing_key_for(&record.event_type).ok_or_else(|| {
            OutboxError::PublishTerminal(format!(
                "no routing key mapping for event_type {}",
                record.event_type
            ))
        })?;

        match with_timeout_result(self.publish_timeout, self.send(record, routing_key)).await {
            Ok(()) => Ok(()),
            Err(e) => Err(OutboxError::PublishTransient(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn correlation_id_is_read_from_payload() {
        let record = OutboxRecord::new(
            "document",
            Uuid::new_v4(),
            "DocumentUploaded",
            json!({ "correlationId": "abc-123", "documentName": "x.pdf" }),
        );
        assert_eq!(
            AmqpOutboxPublisher::correlation_id(&record),
            Some("abc-123".to_string())
        );
    }

    #[test]
    fn correlation_id_is_none_when_absent() {
        let record = OutboxRecord::new(
            "document",
            Uuid::new_v4(),
            "DocumentUploaded",
            json!({ "documentName": "x.pdf" }),
        );
        assert_eq!(AmqpOutboxPublisher::correlation_id(&record), None);
    }
}
