//! Envelope decoding tests
//!
//! Covers both variants, the legacy aliases, generated identifiers, and the
//! per-field rejection codes.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::{Envelope, EnvelopeError, EnvelopeMode};

/// A fully-populated strict envelope
fn full_doc() -> Value {
    json!({
        "event_id": "7e9b4a1a-93e8-4c3f-9c7e-2f6a1b8d4e0a",
        "trace_id": "0b0f3c62-5a6e-4f0d-8c3b-7d9e1a2b3c4d",
        "producer": "mobile-sdk",
        "actor": "device",
        "app_uuid": "b2a1f0e4-7c3d-4b5a-9e8f-1a2b3c4d5e6f",
        "event_name": "geo.ping",
        "occurred_at": "2026-01-25T10:05:00Z",
        "anon_user_id": "u_demo_0001",
        "device_id_hash": "d_demo_0001",
        "session_id": "s_demo_0001",
        "sdk_version": "2.4.1",
        "event_version": "1",
        "payload": {},
        "context": {"geo": {"lat": 18.4861, "lon": -69.9312, "accuracy_m": 20, "source": "gps"}}
    })
}

// =============================================================================
// Strict envelope
// =============================================================================

#[test]
fn test_strict_accepts_full_envelope() {
    let ev = Envelope::parse(&full_doc(), EnvelopeMode::Strict).unwrap();
    assert_eq!(ev.event_name, "geo.ping");
    assert_eq!(ev.producer, "mobile-sdk");
    assert_eq!(
        ev.occurred_at,
        Utc.with_ymd_and_hms(2026, 1, 25, 10, 5, 0).unwrap()
    );
    assert_eq!(ev.anon_user_id, "u_demo_0001");
}

#[test]
fn test_strict_rejects_missing_fields() {
    for field in [
        "event_id",
        "trace_id",
        "producer",
        "actor",
        "app_uuid",
        "event_name",
        "occurred_at",
        "anon_user_id",
        "sdk_version",
        "payload",
        "context",
    ] {
        let mut doc = full_doc();
        doc.as_object_mut().unwrap().remove(field);
        let err = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField(field), "field: {field}");
    }
}

#[test]
fn test_strict_rejects_aliases() {
    let mut doc = full_doc();
    let obj = doc.as_object_mut().unwrap();
    let name = obj.remove("event_name").unwrap();
    obj.insert("event_type".to_string(), name);

    let err = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap_err();
    assert_eq!(err, EnvelopeError::MissingField("event_name"));
}

#[test]
fn test_strict_requires_v4_event_id() {
    let mut doc = full_doc();
    // A v1-style UUID: valid syntax, wrong version.
    doc["event_id"] = json!("c232ab00-9414-11ec-b3c8-9f6bdeced846");
    let err = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap_err();
    assert_eq!(err, EnvelopeError::InvalidUuid { field: "event_id" });
}

#[test]
fn test_payload_must_be_object() {
    let mut doc = full_doc();
    doc["payload"] = json!([1, 2, 3]);
    let err = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap_err();
    assert_eq!(
        err,
        EnvelopeError::InvalidType {
            field: "payload",
            expected: "an object"
        }
    );
}

#[test]
fn test_rejects_non_object_document() {
    let err = Envelope::parse(&json!([1, 2]), EnvelopeMode::Strict).unwrap_err();
    assert_eq!(err, EnvelopeError::NotAnObject);
    assert_eq!(err.code(), "invalid_document_type");
}

// =============================================================================
// Lax envelope
// =============================================================================

#[test]
fn test_lax_accepts_legacy_aliases() {
    let doc = json!({
        "app_uuid": "b2a1f0e4-7c3d-4b5a-9e8f-1a2b3c4d5e6f",
        "event_type": "session.start",
        "timestamp": "2026-01-25T10:05:00+00:00",
        "anon_user_id": "u_demo_0001",
        "device_id_hash": "d_demo_0001",
        "session_id": "s_demo_0001",
        "sdk_version": "2.4.1",
        "event_version": "1",
        "payload": {},
        "context": {}
    });

    let ev = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap();
    assert_eq!(ev.event_name, "session.start");
    assert_eq!(
        ev.occurred_at,
        Utc.with_ymd_and_hms(2026, 1, 25, 10, 5, 0).unwrap()
    );
}

#[test]
fn test_lax_generates_ids_and_defaults() {
    let doc = json!({
        "app_uuid": "b2a1f0e4-7c3d-4b5a-9e8f-1a2b3c4d5e6f",
        "event_name": "ui.tap",
        "occurred_at": "2026-01-25T10:05:00Z",
        "anon_user_id": "u_demo_0001",
        "device_id_hash": "d_demo_0001",
        "session_id": "s_demo_0001",
        "sdk_version": "2.4.1",
        "event_version": "1",
        "payload": {},
        "context": {}
    });

    let a = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap();
    let b = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap();
    assert_ne!(a.event_id, b.event_id);
    assert_eq!(a.producer, "unknown");
    assert_eq!(a.actor, "anonymous");
}

#[test]
fn test_lax_canonical_names_win_over_aliases() {
    let mut doc = full_doc();
    doc.as_object_mut()
        .unwrap()
        .insert("event_type".to_string(), json!("legacy.name"));

    let ev = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap();
    assert_eq!(ev.event_name, "geo.ping");
}

#[test]
fn test_lax_still_requires_the_core() {
    let doc = json!({
        "event_name": "ui.tap",
        "occurred_at": "2026-01-25T10:05:00Z",
        "payload": {},
        "context": {}
    });
    let err = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap_err();
    assert_eq!(err, EnvelopeError::MissingField("anon_user_id"));
}

#[test]
fn test_lax_rejects_malformed_supplied_event_id() {
    let mut doc = full_doc();
    doc["event_id"] = json!("not-a-uuid");
    let err = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap_err();
    assert_eq!(err, EnvelopeError::InvalidUuid { field: "event_id" });
}

// =============================================================================
// Identifiers and timestamps
// =============================================================================

#[test]
fn test_short_identifier_rejected_in_both_modes() {
    for mode in [EnvelopeMode::Strict, EnvelopeMode::Lax] {
        let mut doc = full_doc();
        doc["anon_user_id"] = json!("u1");
        let err = Envelope::parse(&doc, mode).unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::InvalidIdentifier {
                field: "anon_user_id"
            }
        );
        assert_eq!(err.code(), "invalid_identifier");
    }
}

#[test]
fn test_identifier_charset_enforced() {
    let mut doc = full_doc();
    doc["device_id_hash"] = json!("name with spaces");
    let err = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap_err();
    assert_eq!(
        err,
        EnvelopeError::InvalidIdentifier {
            field: "device_id_hash"
        }
    );
}

#[test]
fn test_naive_timestamp_taken_as_utc() {
    let mut doc = full_doc();
    doc["occurred_at"] = json!("2026-01-25T10:05:00");
    let ev = Envelope::parse(&doc, EnvelopeMode::Lax).unwrap();
    assert_eq!(
        ev.occurred_at,
        Utc.with_ymd_and_hms(2026, 1, 25, 10, 5, 0).unwrap()
    );
}

#[test]
fn test_offset_timestamp_converted_to_utc() {
    let mut doc = full_doc();
    doc["occurred_at"] = json!("2026-01-25T06:05:00-04:00");
    let ev = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap();
    assert_eq!(
        ev.occurred_at,
        Utc.with_ymd_and_hms(2026, 1, 25, 10, 5, 0).unwrap()
    );
}

#[test]
fn test_garbage_timestamp_rejected() {
    let mut doc = full_doc();
    doc["occurred_at"] = json!("yesterday");
    let err = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap_err();
    assert_eq!(
        err,
        EnvelopeError::InvalidTimestamp {
            field: "occurred_at"
        }
    );
}

// =============================================================================
// Geo context
// =============================================================================

#[test]
fn test_geo_context_extraction() {
    let ev = Envelope::parse(&full_doc(), EnvelopeMode::Strict).unwrap();
    let geo = ev.geo_context().unwrap();
    assert!((geo.lat - 18.4861).abs() < 1e-9);
    assert!((geo.lon - -69.9312).abs() < 1e-9);
    assert_eq!(geo.accuracy_m, Some(20.0));
    assert_eq!(geo.source.as_deref(), Some("gps"));
}

#[test]
fn test_geo_context_absent_or_malformed() {
    let mut doc = full_doc();
    doc["context"] = json!({});
    let ev = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap();
    assert!(ev.geo_context().is_none());

    let mut doc = full_doc();
    doc["context"] = json!({"geo": {"lat": "18.5", "lon": -69.9}});
    let ev = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap();
    assert!(ev.geo_context().is_none());

    let mut doc = full_doc();
    doc["context"] = json!({"geo": {"lat": 123.0, "lon": -69.9}});
    let ev = Envelope::parse(&doc, EnvelopeMode::Strict).unwrap();
    assert!(ev.geo_context().is_none(), "out-of-range latitude");
}

// =============================================================================
// Normalized serialization
// =============================================================================

#[test]
fn test_normalized_event_serializes_canonical_names() {
    let ev = Envelope::parse(&full_doc(), EnvelopeMode::Strict).unwrap();
    let value = serde_json::to_value(&ev).unwrap();

    assert!(value.get("event_name").is_some());
    assert!(value.get("occurred_at").is_some());
    assert!(value.get("event_type").is_none());
    assert!(value.get("timestamp").is_none());

    // Staged payloads must round-trip through the lax parser.
    let reparsed = Envelope::parse(&value, EnvelopeMode::Strict).unwrap();
    assert_eq!(reparsed.event_id, ev.event_id);
    assert_eq!(reparsed.occurred_at, ev.occurred_at);
}
