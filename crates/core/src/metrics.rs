// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide request counters.
//!
//! Counters are plain atomics so the dispatch hot path never takes a
//! lock. Rates are derived on read against the window start.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic request counters, window-scoped.
#[derive(Debug)]
pub struct RequestMetrics {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    latency_ms_sum: AtomicU64,
    window_start_ms: u64,
}

impl RequestMetrics {
    pub fn new(window_start_ms: u64) -> Self {
        Self {
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            latency_ms_sum: AtomicU64::new(0),
            window_start_ms,
        }
    }

    pub fn record(&self, success: bool, latency_ms: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_ms_sum.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Snapshot the counters and derive rates as of `now_ms`.
    pub fn snapshot(&self, now_ms: u64) -> MetricsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let latency_ms_sum = self.latency_ms_sum.load(Ordering::Relaxed);

        let elapsed_ms = now_ms.saturating_sub(self.window_start_ms);
        let requests_per_second = if elapsed_ms == 0 {
            0.0
        } else {
            total as f64 * 1000.0 / elapsed_ms as f64
        };
        let avg_latency_ms = if total == 0 {
            0.0
        } else {
            latency_ms_sum as f64 / total as f64
        };

        MetricsSnapshot {
            total,
            succeeded,
            failed,
            avg_latency_ms,
            requests_per_second,
            window_start_ms: self.window_start_ms,
        }
    }
}

/// Point-in-time view of [`RequestMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub avg_latency_ms: f64,
    pub requests_per_second: f64,
    pub window_start_ms: u64,
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
