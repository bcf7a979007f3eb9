//! Processor error types

use thiserror::Error;

/// Anything that can fail while processing one message
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The document is missing envelope minima
    #[error(transparent)]
    Envelope(#[from] sb_protocol::EnvelopeError),

    /// Store failure (may be transient)
    #[error(transparent)]
    Store(#[from] sb_store::StoreError),

    /// Broker failure while republishing
    #[error(transparent)]
    Broker(#[from] sb_broker::BrokerError),

    /// Geospatial classification failure
    #[error(transparent)]
    Geo(#[from] sb_geo::GeoError),
}

impl ProcessorError {
    /// Short name used in DLQ error documents
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Envelope(_) => "EnvelopeError",
            Self::Store(_) => "StoreError",
            Self::Broker(_) => "BrokerError",
            Self::Geo(_) => "GeoError",
        }
    }
}

/// Result type for message processing
pub type Result<T> = std::result::Result<T, ProcessorError>;
