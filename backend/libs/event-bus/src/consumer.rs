//! Consumer runtime: prefetch, local retry, dead-lettering on exhaustion.
//!
//! A stage's business logic is expressed as a [`MessageHandler`] returning a
//! [`HandlerOutcome`]. The runtime wraps every delivery with the local retry
//! interceptor from `resilience::retry`; once attempts are exhausted the
//! message is nacked without requeue, which the broker routes to the
//! stage's DLQ via its `x-dead-letter-exchange` binding.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::Channel;
use resilience::retry::{with_retry, RetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::envelope::InboundMessage;
use crate::error::EventBusResult;

/// Outcome of handling one message, distinguishing the two failure
/// categories at the handler boundary.
pub enum HandlerOutcome {
    /// Handler ran to completion (including the idempotent-skip and
    /// business-rejection paths, both of which already wrote their own
    /// terminal state). Message is acknowledged.
    Handled,
    /// A terminal, payload-determined business rejection that already wrote
    /// its own terminal state before returning. Acknowledged without retry.
    /// Malformed envelopes (missing correlation fields, unparseable
    /// payloads) are `TransientFailure` instead, so local retries exhaust
    /// and the message reaches the DLQ for operator inspection.
    Rejected(String),
    /// A technical failure expected to clear on its own. Propagated to the
    /// retry interceptor; after exhaustion the message is nacked without
    /// requeue.
    TransientFailure(anyhow::Error),
}

/// A stage's business logic for one bound queue.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> HandlerOutcome;
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub prefetch_count: u16,
    pub retry: RetryConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            prefetch_count: 10,
            retry: RetryConfig {
                max_retries: 5,
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(10),
                backoff_multiplier: 2.0,
                jitter: true,
            },
        }
    }
}

/// Runs one consumer loop against a single queue.
pub struct ConsumerRuntime<H: MessageHandler> {
    channel: Channel,
    queue: String,
    consumer_tag: String,
    config: ConsumerConfig,
    handler: Arc<H>,
}

impl<H: MessageHandler + 'static> ConsumerRuntime<H> {
    pub fn new(channel: Channel, queue: impl Into<String>, handler: Arc<H>, config: ConsumerConfig) -> Self {
        Self {
            channel,
            queue: queue.into(),
            consumer_tag: format!("consumer-{}", Uuid::new_v4()),
            config,
            handler,
        }
    }

    /// Runs until `shutdown` is cancelled. Finishes the in-flight delivery
    /// before returning; does not start a new one after cancellation.
    pub async fn run(&self, shutdown: CancellationToken) -> EventBusResult<()> {
        self.channel
            .basic_qos(self.config.prefetch_count, BasicQosOptions::default())
            .await?;

        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = %self.queue, "consumer runtime started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(queue = %self.queue, "shutdown signal received, stopping consumer");
                    break;
                }
                delivery = consumer.next() => {
                    let Some(delivery) = delivery else {
                        warn!(queue = %self.queue, "consumer stream closed");
                        break;
                    };
                    let delivery = match delivery {
                        Ok(delivery) => delivery,
                        Err(e) => {
                            error!(queue = %self.queue, error = %e, "delivery error");
                            continue;
                        }
                    };

                    // Parsing a fixed byte buffer is deterministic, so these
                    // retries exhaust without ever succeeding, but they run
                    // through the same local-retry budget as every other
                    // failure category before the message reaches the DLQ.
                    let parsed = with_retry(self.config.retry.clone(), || {
                        let delivery = &delivery;
                        async move { InboundMessage::from_delivery(delivery) }
                    })
                    .await;

                    let message = match parsed {
                        Ok(message) => message,
                        Err(e) => {
                            warn!(queue = %self.queue, error = %e, "invalid envelope, retries exhausted, dead-lettering");
                            let _ = delivery
                                .nack(BasicNackOptions { requeue: false, ..Default::default() })
                                .await;
                            continue;
                        }
                    };

                    let span = tracing::info_span!(
                        "handle_message",
                        correlation_id = %message.correlation_id.as_deref().unwrap_or(""),
                        event_id = %message.event_id,
                        aggregate_id = %message.aggregate_id.map(|id| id.to_string()).unwrap_or_default(),
                        routing_key = %message.routing_key,
                        event_type = %message.event_type.as_deref().unwrap_or(""),
                    );

                    match self.dispatch(&message).instrument(span).await {
                        HandlerOutcome::Handled => {
                            let _ = delivery.ack(BasicAckOptions::default()).await;
                        }
                        HandlerOutcome::Rejected(reason) => {
                            warn!(reason = %reason, "message rejected as invalid, acknowledging without retry");
                            let _ = delivery.ack(BasicAckOptions::default()).await;
                        }
                        HandlerOutcome::TransientFailure(err) => {
                            error!(error = %err, "retries exhausted, dead-lettering");
                            let _ = delivery
                                .nack(BasicNackOptions { requeue: false, ..Default::default() })
                                .await;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&self, message: &InboundMessage) -> HandlerOutcome {
        let handler = self.handler.clone();
        let message = message.clone();

        let result = with_retry(self.config.retry.clone(), move || {
            let handler = handler.clone();
            let message = message.clone();
            async move {
                match handler.handle(&message).await {
                    HandlerOutcome::Handled => Ok(HandlerOutcome::Handled),
                    HandlerOutcome::Rejected(reason) => Ok(HandlerOutcome::Rejected(reason)),
                    HandlerOutcome::TransientFailure(err) => Err(err),
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(retry_err) => HandlerOutcome::TransientFailure(anyhow::anyhow!(retry_err.to_string())),
        }
    }
}
