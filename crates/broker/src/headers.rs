//! Message header construction and parsing
//!
//! Identity headers let operators trace a message without decoding the body;
//! the retry header carries the processor's republish count.

use chrono::{DateTime, SecondsFormat, Utc};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::BasicProperties;
use uuid::Uuid;

use sb_protocol::{
    HEADER_APP_UUID, HEADER_EVENT_ID, HEADER_OCCURRED_AT, HEADER_RETRY_AT, HEADER_RETRY_COUNT,
    HEADER_TRACE_ID,
};

/// Identity headers attached by the outbox publisher
#[derive(Debug, Clone)]
pub struct MessageHeaders {
    pub app_uuid: Uuid,
    pub event_id: Option<Uuid>,
    pub trace_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl MessageHeaders {
    /// Render as AMQP field table.
    pub fn to_field_table(&self) -> FieldTable {
        let mut table = FieldTable::default();
        table.insert(
            HEADER_APP_UUID.into(),
            AMQPValue::LongString(self.app_uuid.to_string().into()),
        );
        if let Some(event_id) = self.event_id {
            table.insert(
                HEADER_EVENT_ID.into(),
                AMQPValue::LongString(event_id.to_string().into()),
            );
        }
        if let Some(trace_id) = self.trace_id {
            table.insert(
                HEADER_TRACE_ID.into(),
                AMQPValue::LongString(trace_id.to_string().into()),
            );
        }
        table.insert(
            HEADER_OCCURRED_AT.into(),
            AMQPValue::LongString(
                self.occurred_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
                    .into(),
            ),
        );
        table
    }
}

/// Read the republish count from delivered message properties. Absent or
/// malformed headers count as zero.
pub fn retry_count(properties: &BasicProperties) -> u32 {
    let Some(table) = properties.headers() else {
        return 0;
    };
    let key = ShortString::from(HEADER_RETRY_COUNT);
    match table.inner().get(&key) {
        Some(AMQPValue::LongInt(v)) => (*v).max(0) as u32,
        Some(AMQPValue::LongLongInt(v)) => (*v).max(0) as u32,
        Some(AMQPValue::ShortInt(v)) => (*v).max(0) as u32,
        _ => 0,
    }
}

/// Clone the delivered headers with the retry accounting bumped.
pub fn with_retry_headers(
    existing: Option<&FieldTable>,
    retry: u32,
    at: DateTime<Utc>,
) -> FieldTable {
    let mut table = existing.cloned().unwrap_or_default();
    table.insert(HEADER_RETRY_COUNT.into(), AMQPValue::LongInt(retry as i32));
    table.insert(
        HEADER_RETRY_AT.into(),
        AMQPValue::LongString(at.to_rfc3339_opts(SecondsFormat::Secs, true).into()),
    );
    table
}
