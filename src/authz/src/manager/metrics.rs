//! Counters for index builds and access decisions
//!
//! Decisions are recorded on the request hot path, so the collector is a set
//! of relaxed atomics rather than a locked struct.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time copy of the collected counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexMetrics {
    /// Successful namespace builds (startup and reload)
    pub builds_succeeded: u64,

    /// Failed namespace builds, timeouts included
    pub builds_failed: u64,

    /// Builds that hit the timeout
    pub build_timeouts: u64,

    /// Average duration of successful builds
    pub avg_build_ms: f64,

    /// Allowed decisions
    pub allowed_decisions: u64,

    /// Denied decisions
    pub denied_decisions: u64,

    /// Checks against a namespace with no published index
    pub namespace_not_found: u64,
}

impl IndexMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }

    /// Total decisions answered
    pub fn total_decisions(&self) -> u64 {
        self.allowed_decisions + self.denied_decisions
    }
}

/// Lock-free metrics collector
#[derive(Debug, Default)]
pub struct MetricsCollector {
    builds_succeeded: AtomicU64,
    builds_failed: AtomicU64,
    build_timeouts: AtomicU64,
    build_micros_total: AtomicU64,
    allowed_decisions: AtomicU64,
    denied_decisions: AtomicU64,
    namespace_not_found: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_build_success(&self, elapsed: Duration) {
        self.builds_succeeded.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.build_micros_total.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_build_failure(&self, timed_out: bool) {
        self.builds_failed.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.build_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_decision(&self, allowed: bool) {
        if allowed {
            self.allowed_decisions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied_decisions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_namespace_not_found(&self) {
        self.namespace_not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn snapshot(&self) -> IndexMetrics {
        let builds_succeeded = self.builds_succeeded.load(Ordering::Relaxed);
        let build_micros = self.build_micros_total.load(Ordering::Relaxed);
        let avg_build_ms = if builds_succeeded == 0 {
            0.0
        } else {
            build_micros as f64 / builds_succeeded as f64 / 1000.0
        };

        IndexMetrics {
            builds_succeeded,
            builds_failed: self.builds_failed.load(Ordering::Relaxed),
            build_timeouts: self.build_timeouts.load(Ordering::Relaxed),
            avg_build_ms,
            allowed_decisions: self.allowed_decisions.load(Ordering::Relaxed),
            denied_decisions: self.denied_decisions.load(Ordering::Relaxed),
            namespace_not_found: self.namespace_not_found.load(Ordering::Relaxed),
        }
    }
}
