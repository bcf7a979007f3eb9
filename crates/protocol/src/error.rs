//! Envelope validation errors
//!
//! Every rejection carries a stable machine-readable code that the ingest
//! API surfaces per batch item.

use thiserror::Error;

/// Envelope validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The document is not a JSON object
    #[error("event must be a JSON object")]
    NotAnObject,

    /// A required field is absent or empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON type
    #[error("field {field} must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    /// A timestamp field is not ISO-8601
    #[error("field {field} must be an ISO-8601 UTC timestamp")]
    InvalidTimestamp { field: &'static str },

    /// A UUID field does not parse (or is not v4 in strict mode)
    #[error("field {field} must be a v4 UUID")]
    InvalidUuid { field: &'static str },

    /// An anonymous identifier fails the minimum-length pattern
    #[error("field {field} must be at least 8 characters of [A-Za-z0-9._:-]")]
    InvalidIdentifier { field: &'static str },
}

impl EnvelopeError {
    /// Stable machine-readable code for batch item rejections
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAnObject => "invalid_document_type",
            Self::MissingField(_) => "missing_field",
            Self::InvalidType { .. } => "invalid_type",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::InvalidUuid { .. } => "invalid_uuid",
            Self::InvalidIdentifier { .. } => "invalid_identifier",
        }
    }
}

/// Result type for envelope handling
pub type Result<T> = std::result::Result<T, EnvelopeError>;
