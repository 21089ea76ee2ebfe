//! Pipeline liveness counters.
//!
//! Plain atomic counters shared by the ingestion, store, and delivery layers
//! and reported periodically by the orchestration layer. Constructed once at
//! startup and passed down explicitly; there are no process-wide globals.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters for the ingestion and delivery pipeline.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Messages read off the per-city location topics.
    pub messages_received: AtomicU64,
    /// Location messages that made it into the write batch.
    pub messages_processed: AtomicU64,
    /// Location messages rejected at the boundary.
    pub messages_failed: AtomicU64,
    /// Ride requests read off the per-city request topics.
    pub requests_received: AtomicU64,
    /// Ride requests dropped for staleness.
    pub requests_stale: AtomicU64,
    /// Match results published to users.
    pub matches_published: AtomicU64,
    /// Store write attempts (one per batch submit, including retries).
    pub store_write_attempts: AtomicU64,
    /// Rows confirmed written.
    pub store_write_successes: AtomicU64,
    /// Rows dropped after the retry budget.
    pub store_write_failures: AtomicU64,
    /// Offers forwarded to connected, available drivers.
    pub offers_forwarded: AtomicU64,
    /// Offers dropped because the driver was absent or unavailable.
    pub offers_dropped: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time view for the periodic report.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_stale: self.requests_stale.load(Ordering::Relaxed),
            matches_published: self.matches_published.load(Ordering::Relaxed),
            store_write_attempts: self.store_write_attempts.load(Ordering::Relaxed),
            store_write_successes: self.store_write_successes.load(Ordering::Relaxed),
            store_write_failures: self.store_write_failures.load(Ordering::Relaxed),
            offers_forwarded: self.offers_forwarded.load(Ordering::Relaxed),
            offers_dropped: self.offers_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub requests_received: u64,
    pub requests_stale: u64,
    pub matches_published: u64,
    pub store_write_attempts: u64,
    pub store_write_successes: u64,
    pub store_write_failures: u64,
    pub offers_forwarded: u64,
    pub offers_dropped: u64,
}

impl MetricsSnapshot {
    /// Messages read but neither processed nor rejected yet.
    pub fn in_flight(&self) -> u64 {
        self.messages_received
            .saturating_sub(self.messages_processed + self.messages_failed)
    }
}
