//! # Event Bus
//!
//! AMQP 0-9-1 broker topology, publisher, and consumer runtime for the
//! document processing pipeline: one durable topic exchange (`doc.events`),
//! one durable direct dead-letter exchange (`doc.dlx`), per-stage durable
//! queues, and the local retry-then-dead-letter discipline consumers apply
//! before giving up on a message.
//!
//! This crate is the broker-specific half of the transactional outbox: it
//! supplies an [`publisher::AmqpOutboxPublisher`] implementing
//! [`transactional_outbox::OutboxPublisher`], plus a [`consumer::ConsumerRuntime`]
//! for the consumer side. Topology declaration lives in [`topology`].

pub mod consumer;
pub mod envelope;
pub mod error;
pub mod pool;
pub mod publisher;
pub mod routing;
pub mod topology;

pub use consumer::{ConsumerConfig, ConsumerRuntime, HandlerOutcome, MessageHandler};
pub use envelope::InboundMessage;
pub use error::{EventBusError, EventBusResult};
pub use publisher::AmqpOutboxPublisher;
pub use topology::{declare_exchanges, declare_queue, QueueSpec};
