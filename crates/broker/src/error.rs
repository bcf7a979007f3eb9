//! Broker error types

use thiserror::Error;

/// Broker errors
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Underlying AMQP error (connection, channel, protocol)
    #[error(transparent)]
    Amqp(#[from] lapin::Error),

    /// The broker negatively acknowledged a confirmed publish
    #[error("publish nacked by broker for routing key {routing_key}")]
    Nacked { routing_key: String },

    /// A payload could not be serialized
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;
