//! SB Analytics - Broker
//!
//! The AMQP side of the pipeline: idempotent topology declaration, confirmed
//! persistent publishing, message header accounting, and consumer channels.
//!
//! Only the outbox publisher produces to the exchange; the processor
//! consumes the domain queues and publishes retries and DLQ documents.
//! Ingest never touches this crate.

mod connection;
mod error;
mod headers;
mod publish;
mod topology;

pub use connection::Broker;
pub use error::{BrokerError, Result};
pub use headers::{retry_count, with_retry_headers, MessageHeaders};
pub use publish::EventPublisher;
pub use topology::declare_topology;

#[cfg(test)]
mod headers_test;
