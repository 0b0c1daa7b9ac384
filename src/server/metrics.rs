//! Bridge counters.
//!
//! Plain atomics, updated from network tasks and the host thread alike.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Request and command counters.
#[derive(Debug)]
pub struct BridgeMetrics {
    started_at: Instant,
    /// Requests received, including rejected ones.
    pub requests_total: AtomicU64,
    /// Requests that failed validation.
    pub requests_rejected: AtomicU64,
    /// Commands accepted onto the queue.
    pub commands_queued: AtomicU64,
    /// Commands a handler applied.
    pub commands_dispatched: AtomicU64,
    /// Commands with no handler.
    pub commands_dropped: AtomicU64,
    /// Commands whose handler failed or panicked.
    pub commands_failed: AtomicU64,
    /// Requests currently being served.
    pub active_requests: AtomicUsize,
}

/// Point-in-time view served by `/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub version: String,
    pub uptime_seconds: u64,
    pub generation: u64,
    pub provisioned: bool,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub requests_total: u64,
    pub requests_rejected: u64,
    pub commands_queued: u64,
    pub commands_dispatched: u64,
    pub commands_dropped: u64,
    pub commands_failed: u64,
    pub active_requests: usize,
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            commands_queued: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            commands_dropped: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            active_requests: AtomicUsize::new(0),
        }
    }
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished request.
    pub fn record_request(&self, accepted: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !accepted {
            self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_queued(&self) {
        self.commands_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.commands_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a request in flight until the guard drops.
    pub fn track_request(&self) -> ActiveRequest<'_> {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
        ActiveRequest { metrics: self }
    }

    pub fn active(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Capture the counters together with session and queue state.
    pub fn snapshot(
        &self,
        generation: u64,
        provisioned: bool,
        queue_depth: usize,
        queue_capacity: usize,
    ) -> MetricsSnapshot {
        MetricsSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            generation,
            provisioned,
            queue_depth,
            queue_capacity,
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            commands_queued: self.commands_queued.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            active_requests: self.active(),
        }
    }
}

/// Decrements the active request count on drop.
pub struct ActiveRequest<'a> {
    metrics: &'a BridgeMetrics,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.metrics.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}
