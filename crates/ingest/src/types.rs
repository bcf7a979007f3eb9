//! Request and response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sb_protocol::EnvelopeError;

/// One rejected batch item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedItem {
    pub index: usize,
    pub code: String,
    pub message: String,
}

impl RejectedItem {
    pub fn from_envelope_error(index: usize, error: &EnvelopeError) -> Self {
        Self {
            index,
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }

    pub fn opted_out(index: usize) -> Self {
        Self {
            index,
            code: "opted_out".to_string(),
            message: "identity has opted out of collection".to_string(),
        }
    }
}

/// Batch response: counts plus a per-input-item dedup flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: usize,
    pub deduped: Vec<bool>,
    pub rejected: Vec<RejectedItem>,
}

/// Accumulates per-item outcomes while the batch transaction runs
#[derive(Debug, Default)]
pub struct BatchOutcome {
    accepted: usize,
    deduped: Vec<bool>,
    rejected: Vec<RejectedItem>,
}

impl BatchOutcome {
    pub fn with_capacity(items: usize) -> Self {
        Self {
            accepted: 0,
            deduped: Vec::with_capacity(items),
            rejected: Vec::new(),
        }
    }

    /// Item accepted; `deduped` marks a collision on `(app_uuid, event_id)`.
    pub fn accept(&mut self, deduped: bool) {
        self.accepted += 1;
        self.deduped.push(deduped);
    }

    pub fn reject(&mut self, item: RejectedItem) {
        self.rejected.push(item);
        self.deduped.push(false);
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn deduped_count(&self) -> usize {
        self.deduped.iter().filter(|&&d| d).count()
    }

    /// Every item failed validation (used for the strict-mode 422).
    pub fn all_rejected(&self) -> bool {
        self.accepted == 0 && !self.rejected.is_empty()
    }

    pub fn into_response(self) -> IngestResponse {
        IngestResponse {
            accepted: self.accepted,
            deduped: self.deduped,
            rejected: self.rejected,
        }
    }
}

/// `POST /v1/opt-out` body
#[derive(Debug, Deserialize)]
pub struct OptOutRequest {
    pub app_uuid: Uuid,
    pub anon_user_id: String,
}

/// `POST /v1/privacy/delete` body
#[derive(Debug, Deserialize)]
pub struct PrivacyDeleteRequest {
    pub app_uuid: Uuid,
    pub anon_user_id: String,
    #[serde(default)]
    pub delete_opt_out: bool,
}
