//! Dead-letter envelope
//!
//! Messages that cannot be processed are wrapped in this document and
//! published on the DLQ routing key. The original bytes always survive
//! base64-encoded; the decoded document rides along when decoding got that
//! far.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a message was dead-lettered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqReason {
    /// The body was not valid JSON
    JsonDecode,
    /// The body decoded to something other than an object
    InvalidDocumentType,
    /// The document is missing envelope minima
    MinimalEvent,
    /// A permanent dispatch failure, including exhausted retries
    PermanentBusiness,
}

/// Where the message came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqSource {
    pub queue: String,
    pub routing_key: String,
    pub delivery_tag: u64,
}

/// The failed payload, raw and (when available) decoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqPayload {
    pub raw_value_b64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<Value>,
}

/// The triggering error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// The DLQ document published on `sb.events.dlq`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    pub failed_at: DateTime<Utc>,
    pub reason: DlqReason,
    pub source: DlqSource,
    pub payload: DlqPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DlqError>,
}

impl DlqMessage {
    /// Wrap a failed message.
    pub fn new(reason: DlqReason, source: DlqSource, raw: &[u8], decoded: Option<Value>) -> Self {
        Self {
            failed_at: Utc::now(),
            reason,
            source,
            payload: DlqPayload {
                raw_value_b64: BASE64.encode(raw),
                decoded,
            },
            error: None,
        }
    }

    /// Attach the triggering error.
    pub fn with_error(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(DlqError {
            kind: kind.into(),
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DlqReason::JsonDecode).unwrap(),
            "\"json_decode\""
        );
        assert_eq!(
            serde_json::to_string(&DlqReason::InvalidDocumentType).unwrap(),
            "\"invalid_document_type\""
        );
        assert_eq!(
            serde_json::to_string(&DlqReason::PermanentBusiness).unwrap(),
            "\"permanent_business\""
        );
    }

    #[test]
    fn test_message_shape() {
        let source = DlqSource {
            queue: "sb.events.geo.q".to_string(),
            routing_key: "sb.events.geo".to_string(),
            delivery_tag: 42,
        };
        let msg = DlqMessage::new(DlqReason::JsonDecode, source, b"not json", None)
            .with_error("SyntaxError", "expected value at line 1");

        let doc = serde_json::to_value(&msg).unwrap();
        assert_eq!(doc["reason"], "json_decode");
        assert_eq!(doc["source"]["queue"], "sb.events.geo.q");
        assert_eq!(doc["source"]["delivery_tag"], 42);
        assert_eq!(doc["payload"]["raw_value_b64"], "bm90IGpzb24=");
        assert!(doc["payload"].get("decoded").is_none());
        assert_eq!(doc["error"]["type"], "SyntaxError");
        assert!(doc.get("failed_at").is_some());
    }

    #[test]
    fn test_decoded_payload_included() {
        let source = DlqSource {
            queue: "sb.events.license.q".to_string(),
            routing_key: "sb.events.license".to_string(),
            delivery_tag: 1,
        };
        let decoded = serde_json::json!({"event_name": "license.update"});
        let msg = DlqMessage::new(
            DlqReason::MinimalEvent,
            source,
            b"{\"event_name\":\"license.update\"}",
            Some(decoded.clone()),
        );

        let doc = serde_json::to_value(&msg).unwrap();
        assert_eq!(doc["payload"]["decoded"], decoded);
    }
}
