//! SB Analytics - Protocol
//!
//! The shared wire language of the pipeline: the event envelope (strict and
//! lax variants plus the normalized internal record), the topic routing
//! policy, message header names, and the dead-letter envelope.
//!
//! # Architecture
//!
//! ```text
//! [Producer JSON] ──→ Envelope::from_value ──→ Envelope::{Strict,Lax}
//!                                                    │ normalize()
//!                                                    ▼
//!                                            NormalizedEvent ──→ routing_keys()
//! ```
//!
//! Every component speaks `NormalizedEvent`; nothing downstream of
//! normalization ever looks at the raw document again except to archive it.

mod dlq;
mod envelope;
mod error;
mod event;
mod headers;
mod routing;

pub use dlq::{DlqError, DlqMessage, DlqPayload, DlqReason, DlqSource};
pub use envelope::{Envelope, EnvelopeMode, LaxEnvelope, StrictEnvelope};
pub use error::{EnvelopeError, Result};
pub use event::{GeoContext, NormalizedEvent, MIN_IDENTIFIER_LEN};
pub use headers::{
    HEADER_APP_UUID, HEADER_EVENT_ID, HEADER_OCCURRED_AT, HEADER_RETRY_AT, HEADER_RETRY_COUNT,
    HEADER_TRACE_ID,
};
pub use routing::{
    queue_name, routing_keys, EventFamily, DOMAIN_TOPICS, EXCHANGE, PROTECTED_TOPICS, TOPIC_DLQ,
    TOPIC_GEO, TOPIC_LICENSE, TOPIC_RAW, TOPIC_SCREEN, TOPIC_SESSION, TOPIC_SYSTEM, TOPIC_UI,
};

#[cfg(test)]
mod envelope_test;
