//! The normalized internal event record
//!
//! Both envelope variants collapse into `NormalizedEvent`; everything past
//! validation (outbox staging, broker payloads, materializers) consumes this
//! one shape.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{EnvelopeError, Result};
use crate::routing::EventFamily;

/// Minimum length for anonymous identifiers.
///
/// Anything shorter is assumed to be a raw (potentially identifying) value
/// rather than a hash or generated id, and is rejected outright.
pub const MIN_IDENTIFIER_LEN: usize = 8;

/// A validated, normalized event
///
/// Field names here are the canonical envelope names; the lax aliases
/// (`event_type`, `timestamp`) never survive normalization. Serialization of
/// this struct is the exact payload staged in the outbox and carried on the
/// broker.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedEvent {
    pub event_id: Uuid,
    pub trace_id: Uuid,
    pub producer: String,
    pub actor: String,
    pub app_uuid: Uuid,
    pub event_name: String,
    pub occurred_at: DateTime<Utc>,
    pub anon_user_id: String,
    pub device_id_hash: String,
    pub session_id: String,
    pub sdk_version: String,
    pub event_version: String,
    pub payload: Map<String, Value>,
    pub context: Map<String, Value>,
}

impl NormalizedEvent {
    /// Event family derived from the `event_name` prefix
    pub fn family(&self) -> EventFamily {
        EventFamily::from_event_name(&self.event_name)
    }

    /// The optional `context.geo` block, if well-formed.
    ///
    /// Returns `None` when the block is absent or its coordinates are not
    /// numeric; a geo event without usable coordinates simply has nothing to
    /// materialize.
    pub fn geo_context(&self) -> Option<GeoContext> {
        let geo = self.context.get("geo")?.as_object()?;
        let lat = geo.get("lat")?.as_f64()?;
        let lon = geo.get("lon")?.as_f64()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }

        Some(GeoContext {
            lat,
            lon,
            accuracy_m: geo.get("accuracy_m").and_then(Value::as_f64),
            source: geo
                .get("source")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Geolocation carried in `context.geo`
#[derive(Debug, Clone, PartialEq)]
pub struct GeoContext {
    pub lat: f64,
    pub lon: f64,
    pub accuracy_m: Option<f64>,
    pub source: Option<String>,
}

/// Validate an anonymous identifier against the minimum-length pattern.
///
/// There is deliberately no escape hatch: free-form identifiers are how PII
/// leaks into an "anonymized" pipeline.
pub(crate) fn validate_identifier(field: &'static str, value: &str) -> Result<()> {
    if value.len() < MIN_IDENTIFIER_LEN {
        return Err(EnvelopeError::InvalidIdentifier { field });
    }
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if !ok {
        return Err(EnvelopeError::InvalidIdentifier { field });
    }
    Ok(())
}
