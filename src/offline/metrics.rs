//! # Queue Metrics
//!
//! Counters describing what the offline queue has done since it was created.
//! Counters only ever grow; [`QueueMetrics::snapshot`] copies them out.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct QueueMetrics {
    drains_started: AtomicU64,
    drains_skipped: AtomicU64,
    items_synced: AtomicU64,
    items_retried: AtomicU64,
    items_dropped: AtomicU64,
    items_evicted: AtomicU64,
}

/// Point-in-time copy of [`QueueMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    /// Drain passes that ran
    pub drains_started: u64,
    /// Drain calls rejected because another pass was in flight
    pub drains_skipped: u64,
    /// Items delivered to the remote store
    pub items_synced: u64,
    /// Failed attempts that left the item queued for another try
    pub items_retried: u64,
    /// Items abandoned after exhausting their retries
    pub items_dropped: u64,
    /// Items pushed out by the capacity bound
    pub items_evicted: u64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_drain_start(&self) {
        self.drains_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drain_skipped(&self) {
        self.drains_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synced(&self) {
        self.items_synced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.items_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.items_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, count: u64) {
        self.items_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            drains_started: self.drains_started.load(Ordering::Relaxed),
            drains_skipped: self.drains_skipped.load(Ordering::Relaxed),
            items_synced: self.items_synced.load(Ordering::Relaxed),
            items_retried: self.items_retried.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            items_evicted: self.items_evicted.load(Ordering::Relaxed),
        }
    }

    /// Fraction of attempted deliveries that succeeded
    pub fn success_rate(&self) -> f64 {
        let snapshot = self.snapshot();
        let attempts = snapshot.items_synced + snapshot.items_retried + snapshot.items_dropped;
        if attempts == 0 {
            0.0
        } else {
            snapshot.items_synced as f64 / attempts as f64
        }
    }
}
