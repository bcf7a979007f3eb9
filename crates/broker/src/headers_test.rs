//! Header construction and parsing tests

use chrono::{TimeZone, Utc};
use lapin::types::{AMQPValue, ShortString};
use lapin::BasicProperties;
use uuid::Uuid;

use crate::headers::{retry_count, with_retry_headers, MessageHeaders};

fn headers() -> MessageHeaders {
    MessageHeaders {
        app_uuid: Uuid::parse_str("b2a1f0e4-7c3d-4b5a-9e8f-1a2b3c4d5e6f").unwrap(),
        event_id: Some(Uuid::parse_str("7e9b4a1a-93e8-4c3f-9c7e-2f6a1b8d4e0a").unwrap()),
        trace_id: None,
        occurred_at: Utc.with_ymd_and_hms(2026, 1, 25, 10, 5, 0).unwrap(),
    }
}

fn get(table: &lapin::types::FieldTable, key: &str) -> Option<AMQPValue> {
    table.inner().get(&ShortString::from(key)).cloned()
}

#[test]
fn test_field_table_contents() {
    let table = headers().to_field_table();

    assert_eq!(
        get(&table, "app_uuid"),
        Some(AMQPValue::LongString(
            "b2a1f0e4-7c3d-4b5a-9e8f-1a2b3c4d5e6f".into()
        ))
    );
    assert!(get(&table, "event_id").is_some());
    assert!(get(&table, "trace_id").is_none());
    assert_eq!(
        get(&table, "occurred_at"),
        Some(AMQPValue::LongString("2026-01-25T10:05:00Z".into()))
    );
}

#[test]
fn test_retry_count_default_zero() {
    assert_eq!(retry_count(&BasicProperties::default()), 0);

    let props = BasicProperties::default().with_headers(headers().to_field_table());
    assert_eq!(retry_count(&props), 0);
}

#[test]
fn test_retry_roundtrip() {
    let at = Utc.with_ymd_and_hms(2026, 1, 25, 10, 6, 0).unwrap();
    let table = with_retry_headers(Some(&headers().to_field_table()), 3, at);

    let props = BasicProperties::default().with_headers(table.clone());
    assert_eq!(retry_count(&props), 3);

    // Identity headers survive the retry bump.
    assert!(get(&table, "app_uuid").is_some());
    assert_eq!(
        get(&table, "sb_retry_at"),
        Some(AMQPValue::LongString("2026-01-25T10:06:00Z".into()))
    );
}

#[test]
fn test_retry_increment_chain() {
    let at = Utc.with_ymd_and_hms(2026, 1, 25, 10, 6, 0).unwrap();
    let mut table = with_retry_headers(None, 1, at);
    for retry in 2..=5 {
        table = with_retry_headers(Some(&table), retry, at);
    }

    let props = BasicProperties::default().with_headers(table);
    assert_eq!(retry_count(&props), 5);
}

#[test]
fn test_malformed_retry_header_is_zero() {
    let mut table = with_retry_headers(None, 1, Utc::now());
    table.insert("sb_retry".into(), AMQPValue::LongString("three".into()));
    let props = BasicProperties::default().with_headers(table);
    assert_eq!(retry_count(&props), 0);
}
