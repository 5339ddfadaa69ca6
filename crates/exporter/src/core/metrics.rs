//! Run counters
//!
//! Atomic counters updated from every stage of a run, read back as a
//! snapshot for the end-of-run summary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one export run
#[derive(Debug, Default)]
pub struct RunMetrics {
    pub galleries_visited: AtomicU64,
    pub galleries_skipped: AtomicU64,
    pub galleries_abandoned: AtomicU64,
    pub listing_calls: AtomicU64,
    pub retries_attempted: AtomicU64,
    pub items_downloaded: AtomicU64,
    pub items_present: AtomicU64,
    pub items_failed: AtomicU64,
    pub sidecars_written: AtomicU64,
    pub bytes_downloaded: AtomicU64,
}

impl RunMetrics {
    pub fn record_gallery_visited(&self) {
        self.galleries_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gallery_skipped(&self) {
        self.galleries_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gallery_abandoned(&self) {
        self.galleries_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_calls(&self, calls: u64) {
        self.listing_calls.fetch_add(calls, Ordering::Relaxed);
    }

    pub fn record_retries(&self, retries: u64) {
        self.retries_attempted.fetch_add(retries, Ordering::Relaxed);
    }

    /// Record a completed transfer and whether a sidecar accompanied it
    pub fn record_item_downloaded(&self, size: u64, with_sidecar: bool) {
        self.items_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(size, Ordering::Relaxed);
        if with_sidecar {
            self.sidecars_written.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an item whose file was already on disk
    pub fn record_item_present(&self) {
        self.items_present.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> RunMetricsSnapshot {
        RunMetricsSnapshot {
            galleries_visited: self.galleries_visited.load(Ordering::Relaxed),
            galleries_skipped: self.galleries_skipped.load(Ordering::Relaxed),
            galleries_abandoned: self.galleries_abandoned.load(Ordering::Relaxed),
            listing_calls: self.listing_calls.load(Ordering::Relaxed),
            retries_attempted: self.retries_attempted.load(Ordering::Relaxed),
            items_downloaded: self.items_downloaded.load(Ordering::Relaxed),
            items_present: self.items_present.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            sidecars_written: self.sidecars_written.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of run metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetricsSnapshot {
    pub galleries_visited: u64,
    pub galleries_skipped: u64,
    pub galleries_abandoned: u64,
    pub listing_calls: u64,
    pub retries_attempted: u64,
    pub items_downloaded: u64,
    pub items_present: u64,
    pub items_failed: u64,
    pub sidecars_written: u64,
    pub bytes_downloaded: u64,
}

impl RunMetricsSnapshot {
    /// Total data transferred in megabytes
    pub fn total_mb(&self) -> f64 {
        self.bytes_downloaded as f64 / 1_000_000.0
    }
}
