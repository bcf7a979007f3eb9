//! Processor metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by all queue workers
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    consumed: AtomicU64,
    processed: AtomicU64,
    deduped: AtomicU64,
    opted_out: AtomicU64,
    retried: AtomicU64,
    dlq: AtomicU64,
    requeued: AtomicU64,
}

/// Point-in-time metrics view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorMetricsSnapshot {
    pub consumed: u64,
    pub processed: u64,
    pub deduped: u64,
    pub opted_out: u64,
    pub retried: u64,
    pub dlq: u64,
    pub requeued: u64,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduped(&self) {
        self.deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_opted_out(&self) {
        self.opted_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dlq(&self) {
        self.dlq.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorMetricsSnapshot {
        ProcessorMetricsSnapshot {
            consumed: self.consumed.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            deduped: self.deduped.load(Ordering::Relaxed),
            opted_out: self.opted_out.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dlq: self.dlq.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
        }
    }
}
