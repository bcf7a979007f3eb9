//! Broker message header names
//!
//! Headers travel alongside the JSON payload so operators can trace a
//! message without decoding it, and so retry accounting survives republish.

/// Envelope identity headers set by the outbox publisher
pub const HEADER_EVENT_ID: &str = "event_id";
pub const HEADER_TRACE_ID: &str = "trace_id";
pub const HEADER_OCCURRED_AT: &str = "occurred_at";
pub const HEADER_APP_UUID: &str = "app_uuid";

/// Retry count header, incremented each time the processor republishes a
/// message after a transient failure
pub const HEADER_RETRY_COUNT: &str = "sb_retry";

/// Timestamp of the most recent republish
pub const HEADER_RETRY_AT: &str = "sb_retry_at";
