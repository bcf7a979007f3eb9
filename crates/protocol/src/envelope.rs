//! Envelope decoding
//!
//! Two accepted envelopes, selected by configuration:
//!
//! - **Strict**: the full envelope with canonical field names. Any missing or
//!   ill-typed field rejects the item.
//! - **Lax**: accepts the legacy aliases `event_type` → `event_name` and
//!   `timestamp` → `occurred_at`, generates `event_id`/`trace_id` when
//!   absent, and defaults `producer`/`actor`.
//!
//! Parsing is field-by-field rather than a serde derive so each rejection
//! carries a precise code and field name for the batch response.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{EnvelopeError, Result};
use crate::event::{validate_identifier, NormalizedEvent};

/// Which envelope variant to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMode {
    Strict,
    Lax,
}

/// The full envelope, canonical names only
#[derive(Debug, Clone)]
pub struct StrictEnvelope {
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

/// The legacy-tolerant envelope
#[derive(Debug, Clone)]
pub struct LaxEnvelope {
    pub event_id: Option<Uuid>,
    pub trace_id: Option<Uuid>,
    pub producer: Option<String>,
    pub actor: Option<String>,
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

/// A decoded envelope, tagged by variant
#[derive(Debug, Clone)]
pub enum Envelope {
    Strict(StrictEnvelope),
    Lax(LaxEnvelope),
}

impl Envelope {
    /// Decode a JSON document as the given envelope variant.
    pub fn from_value(doc: &Value, mode: EnvelopeMode) -> Result<Self> {
        let obj = doc.as_object().ok_or(EnvelopeError::NotAnObject)?;
        match mode {
            EnvelopeMode::Strict => parse_strict(obj).map(Envelope::Strict),
            EnvelopeMode::Lax => parse_lax(obj).map(Envelope::Lax),
        }
    }

    /// Collapse into the normalized record, filling lax defaults.
    pub fn normalize(self) -> NormalizedEvent {
        match self {
            Envelope::Strict(e) => NormalizedEvent {
                event_id: e.event_id,
                trace_id: e.trace_id,
                producer: e.producer,
                actor: e.actor,
                app_uuid: e.app_uuid,
                event_name: e.event_name,
                occurred_at: e.occurred_at,
                anon_user_id: e.anon_user_id,
                device_id_hash: e.device_id_hash,
                session_id: e.session_id,
                sdk_version: e.sdk_version,
                event_version: e.event_version,
                payload: e.payload,
                context: e.context,
            },
            Envelope::Lax(e) => NormalizedEvent {
                event_id: e.event_id.unwrap_or_else(Uuid::new_v4),
                trace_id: e.trace_id.unwrap_or_else(Uuid::new_v4),
                producer: e.producer.unwrap_or_else(|| "unknown".to_string()),
                actor: e.actor.unwrap_or_else(|| "anonymous".to_string()),
                app_uuid: e.app_uuid,
                event_name: e.event_name,
                occurred_at: e.occurred_at,
                anon_user_id: e.anon_user_id,
                device_id_hash: e.device_id_hash,
                session_id: e.session_id,
                sdk_version: e.sdk_version,
                event_version: e.event_version,
                payload: e.payload,
                context: e.context,
            },
        }
    }

    /// Decode and normalize in one step.
    pub fn parse(doc: &Value, mode: EnvelopeMode) -> Result<NormalizedEvent> {
        Ok(Self::from_value(doc, mode)?.normalize())
    }
}

fn parse_strict(obj: &Map<String, Value>) -> Result<StrictEnvelope> {
    let event_id = require_uuid(obj, "event_id")?;
    // Only v4 event ids are accepted in strict mode; anything else is a
    // producer bug or an attempt to smuggle a meaningful identifier.
    if event_id.get_version() != Some(uuid::Version::Random) {
        return Err(EnvelopeError::InvalidUuid { field: "event_id" });
    }

    let anon_user_id = require_string(obj, "anon_user_id")?;
    let device_id_hash = require_string(obj, "device_id_hash")?;
    let session_id = require_string(obj, "session_id")?;
    validate_identifier("anon_user_id", &anon_user_id)?;
    validate_identifier("device_id_hash", &device_id_hash)?;
    validate_identifier("session_id", &session_id)?;

    Ok(StrictEnvelope {
        event_id,
        trace_id: require_uuid(obj, "trace_id")?,
        producer: require_string(obj, "producer")?,
        actor: require_string(obj, "actor")?,
        app_uuid: require_uuid(obj, "app_uuid")?,
        event_name: require_string(obj, "event_name")?,
        occurred_at: require_timestamp(obj, "occurred_at")?,
        anon_user_id,
        device_id_hash,
        session_id,
        sdk_version: require_string(obj, "sdk_version")?,
        event_version: require_string(obj, "event_version")?,
        payload: require_object(obj, "payload")?,
        context: require_object(obj, "context")?,
    })
}

fn parse_lax(obj: &Map<String, Value>) -> Result<LaxEnvelope> {
    let event_name = match obj.get("event_name") {
        Some(v) => as_nonempty_string(v, "event_name")?,
        None => require_string(obj, "event_type").map_err(|e| match e {
            // Report the canonical name when neither alias is present.
            EnvelopeError::MissingField(_) => EnvelopeError::MissingField("event_name"),
            other => other,
        })?,
    };

    let occurred_at = match obj.get("occurred_at") {
        Some(v) => parse_timestamp(v, "occurred_at")?,
        None => match obj.get("timestamp") {
            Some(v) => parse_timestamp(v, "timestamp")?,
            None => return Err(EnvelopeError::MissingField("occurred_at")),
        },
    };

    let anon_user_id = require_string(obj, "anon_user_id")?;
    let device_id_hash = require_string(obj, "device_id_hash")?;
    let session_id = require_string(obj, "session_id")?;
    validate_identifier("anon_user_id", &anon_user_id)?;
    validate_identifier("device_id_hash", &device_id_hash)?;
    validate_identifier("session_id", &session_id)?;

    Ok(LaxEnvelope {
        event_id: optional_uuid(obj, "event_id")?,
        trace_id: optional_uuid(obj, "trace_id")?,
        producer: optional_string(obj, "producer")?,
        actor: optional_string(obj, "actor")?,
        app_uuid: require_uuid(obj, "app_uuid")?,
        event_name,
        occurred_at,
        anon_user_id,
        device_id_hash,
        session_id,
        sdk_version: require_string(obj, "sdk_version")?,
        event_version: require_string(obj, "event_version")?,
        payload: require_object(obj, "payload")?,
        context: require_object(obj, "context")?,
    })
}

// =============================================================================
// Field extraction
// =============================================================================

fn require_string(obj: &Map<String, Value>, field: &'static str) -> Result<String> {
    match obj.get(field) {
        Some(v) => as_nonempty_string(v, field),
        None => Err(EnvelopeError::MissingField(field)),
    }
}

fn as_nonempty_string(v: &Value, field: &'static str) -> Result<String> {
    let s = v.as_str().ok_or(EnvelopeError::InvalidType {
        field,
        expected: "a string",
    })?;
    if s.trim().is_empty() {
        return Err(EnvelopeError::MissingField(field));
    }
    Ok(s.to_string())
}

fn optional_string(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_nonempty_string(v, field).map(Some),
    }
}

fn require_uuid(obj: &Map<String, Value>, field: &'static str) -> Result<Uuid> {
    let raw = require_string(obj, field)?;
    Uuid::parse_str(raw.trim()).map_err(|_| EnvelopeError::InvalidUuid { field })
}

fn optional_uuid(obj: &Map<String, Value>, field: &'static str) -> Result<Option<Uuid>> {
    match optional_string(obj, field)? {
        Some(raw) => Uuid::parse_str(raw.trim())
            .map(Some)
            .map_err(|_| EnvelopeError::InvalidUuid { field }),
        None => Ok(None),
    }
}

fn require_timestamp(obj: &Map<String, Value>, field: &'static str) -> Result<DateTime<Utc>> {
    match obj.get(field) {
        Some(v) => parse_timestamp(v, field),
        None => Err(EnvelopeError::MissingField(field)),
    }
}

/// Accepts RFC 3339 with an offset or `Z`; naive timestamps are taken as UTC.
fn parse_timestamp(v: &Value, field: &'static str) -> Result<DateTime<Utc>> {
    let s = v.as_str().ok_or(EnvelopeError::InvalidTimestamp { field })?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| EnvelopeError::InvalidTimestamp { field })
}

fn require_object(obj: &Map<String, Value>, field: &'static str) -> Result<Map<String, Value>> {
    match obj.get(field) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(EnvelopeError::InvalidType {
            field,
            expected: "an object",
        }),
        None => Err(EnvelopeError::MissingField(field)),
    }
}
