//! Metrics
//!
//! Counters describing how the coordinator reconciled auth events.

use std::sync::atomic::{AtomicU64, Ordering};

/// Session synchronization metrics collector.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Auth events received.
    pub events_received: AtomicU64,
    /// Events dropped because a newer one arrived inside the window.
    pub events_superseded: AtomicU64,
    /// Coalesced processing runs.
    pub processing_runs: AtomicU64,
    /// Profile fetches issued.
    pub fetches_started: AtomicU64,
    /// Fetch requests skipped because one was already in flight.
    pub fetches_deduplicated: AtomicU64,
    /// Fetch results dropped because the session moved on.
    pub stale_results_discarded: AtomicU64,
    /// Profile fetches that failed.
    pub fetch_failures: AtomicU64,
}

impl SyncMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an auth event.
    pub fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event replaced inside its debounce window.
    pub fn record_superseded(&self) {
        self.events_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a coalesced processing run.
    pub fn record_run(&self) {
        self.processing_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a profile fetch.
    pub fn record_fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fetch skipped because one was in flight.
    pub fn record_fetch_deduplicated(&self) {
        self.fetches_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fetch result dropped as stale.
    pub fn record_stale_result(&self) {
        self.stale_results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed profile fetch.
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_superseded: self.events_superseded.load(Ordering::Relaxed),
            processing_runs: self.processing_runs.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_deduplicated: self.fetches_deduplicated.load(Ordering::Relaxed),
            stale_results_discarded: self.stale_results_discarded.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.events_received.store(0, Ordering::Relaxed);
        self.events_superseded.store(0, Ordering::Relaxed);
        self.processing_runs.store(0, Ordering::Relaxed);
        self.fetches_started.store(0, Ordering::Relaxed);
        self.fetches_deduplicated.store(0, Ordering::Relaxed);
        self.stale_results_discarded.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_superseded: u64,
    pub processing_runs: u64,
    pub fetches_started: u64,
    pub fetches_deduplicated: u64,
    pub stale_results_discarded: u64,
    pub fetch_failures: u64,
}

impl MetricsSnapshot {
    /// Share of received events that were coalesced away.
    pub fn coalescing_ratio(&self) -> f64 {
        if self.events_received == 0 {
            0.0
        } else {
            self.events_superseded as f64 / self.events_received as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = SyncMetrics::new();
        for _ in 0..4 {
            metrics.record_event();
        }
        metrics.record_superseded();
        metrics.record_superseded();
        metrics.record_run();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_received, 4);
        assert_eq!(snapshot.processing_runs, 1);
        assert!((snapshot.coalescing_ratio() - 0.5).abs() < f64::EPSILON);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
