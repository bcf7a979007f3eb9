//! Ingest metrics
//!
//! Lock-free counters snapshotted for periodic and shutdown logging.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the ingest surface
#[derive(Debug, Default)]
pub struct IngestMetrics {
    requests: AtomicU64,
    items_accepted: AtomicU64,
    items_deduped: AtomicU64,
    items_rejected: AtomicU64,
    opt_outs: AtomicU64,
    privacy_deletes: AtomicU64,
}

/// Point-in-time metrics view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestMetricsSnapshot {
    pub requests: u64,
    pub items_accepted: u64,
    pub items_deduped: u64,
    pub items_rejected: u64,
    pub opt_outs: u64,
    pub privacy_deletes: u64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, accepted: u64, deduped: u64, rejected: u64) {
        self.items_accepted.fetch_add(accepted, Ordering::Relaxed);
        self.items_deduped.fetch_add(deduped, Ordering::Relaxed);
        self.items_rejected.fetch_add(rejected, Ordering::Relaxed);
    }

    pub fn record_opt_out(&self) {
        self.opt_outs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_privacy_delete(&self) {
        self.privacy_deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestMetricsSnapshot {
        IngestMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            items_accepted: self.items_accepted.load(Ordering::Relaxed),
            items_deduped: self.items_deduped.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            opt_outs: self.opt_outs.load(Ordering::Relaxed),
            privacy_deletes: self.privacy_deletes.load(Ordering::Relaxed),
        }
    }
}
