//! Connection pool metrics
//!
//! Lightweight counters/gauges the pool updates as a side channel; shared
//! via `Arc` with whatever exporter the hosting process wires up.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    active_connections: AtomicU64,
    dial_attempts: AtomicU64,
    dial_failures: AtomicU64,
    peers_evicted: AtomicU64,
    cleanup_runs: AtomicU64,
}

/// Point-in-time copy of all metric values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub active_connections: u64,
    pub dial_attempts: u64,
    pub dial_failures: u64,
    pub peers_evicted: u64,
    pub cleanup_runs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            active_connections: AtomicU64::new(0),
            dial_attempts: AtomicU64::new(0),
            dial_failures: AtomicU64::new(0),
            peers_evicted: AtomicU64::new(0),
            cleanup_runs: AtomicU64::new(0),
        }
    }

    pub fn set_active_connections(&self, count: u64) {
        self.active_connections.store(count, Ordering::Relaxed);
    }

    pub fn increment_dial_attempts(&self) {
        self.dial_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dial_failures(&self) {
        self.dial_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_peers_evicted(&self) {
        self.peers_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cleanup_runs(&self) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            dial_attempts: self.dial_attempts.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            peers_evicted: self.peers_evicted.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
        }
    }

    /// Emit the current values as a single log line
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            "metrics: active={} dials={} dial_failures={} evicted={} cleanup_runs={}",
            s.active_connections, s.dial_attempts, s.dial_failures, s.peers_evicted, s.cleanup_runs
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let metrics = Metrics::new();

        metrics.set_active_connections(3);
        metrics.increment_dial_attempts();
        metrics.increment_dial_attempts();
        metrics.increment_dial_failures();
        metrics.increment_peers_evicted();
        metrics.increment_cleanup_runs();

        let s = metrics.snapshot();
        assert_eq!(s.active_connections, 3);
        assert_eq!(s.dial_attempts, 2);
        assert_eq!(s.dial_failures, 1);
        assert_eq!(s.peers_evicted, 1);
        assert_eq!(s.cleanup_runs, 1);
    }

    #[test]
    fn test_new_is_zeroed() {
        let s = Metrics::new().snapshot();
        assert_eq!(s.active_connections, 0);
        assert_eq!(s.dial_attempts, 0);
        assert_eq!(s.dial_failures, 0);
    }
}
