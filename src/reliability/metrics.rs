use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters describing what the pipeline has done so far.
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    submitted_records: AtomicU64,
    flushes: AtomicU64,
    empty_flushes: AtomicU64,
    delivered_batches: AtomicU64,
    delivered_records: AtomicU64,
    failed_attempts: AtomicU64,
    requeued_records: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub submitted_records: u64,
    pub flushes: u64,
    pub empty_flushes: u64,
    pub delivered_batches: u64,
    pub delivered_records: u64,
    pub failed_attempts: u64,
    pub requeued_records: u64,
}

impl MetricsSnapshot {
    /// Attempts that actually reached the delivery client.
    pub fn delivery_attempts(&self) -> u64 {
        self.delivered_batches + self.failed_attempts
    }
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, empty: bool) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        if empty {
            self.empty_flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_delivered(&self, records: usize) {
        self.delivered_batches.fetch_add(1, Ordering::Relaxed);
        self.delivered_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self, requeued: usize) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
        self.requeued_records
            .fetch_add(requeued as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted_records: self.submitted_records.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            empty_flushes: self.empty_flushes.load(Ordering::Relaxed),
            delivered_batches: self.delivered_batches.load(Ordering::Relaxed),
            delivered_records: self.delivered_records.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            requeued_records: self.requeued_records.load(Ordering::Relaxed),
        }
    }
}
