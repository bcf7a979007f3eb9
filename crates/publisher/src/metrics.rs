//! Publisher metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the outbox drain loop
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    rows_leased: AtomicU64,
    rows_sent: AtomicU64,
    rows_retried: AtomicU64,
    rows_parked: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time metrics view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherMetricsSnapshot {
    pub rows_leased: u64,
    pub rows_sent: u64,
    pub rows_retried: u64,
    pub rows_parked: u64,
    pub reconnects: u64,
}

impl PublisherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_leased(&self, count: u64) {
        self.rows_leased.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.rows_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.rows_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parked(&self) {
        self.rows_parked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PublisherMetricsSnapshot {
        PublisherMetricsSnapshot {
            rows_leased: self.rows_leased.load(Ordering::Relaxed),
            rows_sent: self.rows_sent.load(Ordering::Relaxed),
            rows_retried: self.rows_retried.load(Ordering::Relaxed),
            rows_parked: self.rows_parked.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
