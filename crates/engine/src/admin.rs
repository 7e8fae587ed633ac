// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin subsystem: request counters, bounded error history and the
//! fleet overview.

use flo_core::{
    Clock, ErrorEntry, ErrorKind, ErrorRing, MetricsSnapshot, OrchestratorState, RequestMetrics,
    SystemClock,
};
use flo_registry::Locator;
use flo_wire::SystemOverview;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Number of errors included in an overview.
const OVERVIEW_ERRORS: usize = 10;

pub struct Admin {
    locator: Arc<Locator>,
    metrics: RequestMetrics,
    errors: ErrorRing,
    /// Services seen unhealthy, reported Degraded until the next clean
    /// refresh after they reappear via discovery.
    recovering: Mutex<HashSet<String>>,
    /// Well-known logical names, from configuration order.
    known_services: Vec<String>,
}

impl Admin {
    pub fn new(locator: Arc<Locator>, known_services: Vec<String>) -> Self {
        Self {
            locator,
            metrics: RequestMetrics::new(SystemClock.epoch_ms()),
            errors: ErrorRing::default(),
            recovering: Mutex::new(HashSet::new()),
            known_services,
        }
    }

    pub fn record_request(
        &self,
        service: &str,
        operation: &str,
        success: bool,
        latency_ms: u64,
        request_id: &str,
    ) {
        tracing::debug!(service, operation, success, latency_ms, request_id, "request recorded");
        self.metrics.record(success, latency_ms);
    }

    pub fn record_error(
        &self,
        service: &str,
        operation: &str,
        kind: ErrorKind,
        message: &str,
        request_id: &str,
    ) {
        self.errors.record(ErrorEntry {
            timestamp_ms: SystemClock.epoch_ms(),
            service: service.to_string(),
            operation: operation.to_string(),
            kind,
            message: message.to_string(),
            request_id: request_id.to_string(),
        });
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(SystemClock.epoch_ms())
    }

    /// Most recent errors, newest last.
    pub fn errors(&self, limit: Option<usize>) -> Vec<ErrorEntry> {
        match limit {
            Some(n) => self.errors.last(n),
            None => self.errors.snapshot(),
        }
    }

    /// Refresh every well-known service through the locator and bucket
    /// it. A service that was unhealthy and is present again is
    /// Degraded for exactly one overview: recovering but not yet
    /// trusted.
    pub fn system_overview(&self, state: OrchestratorState) -> SystemOverview {
        let mut healthy = Vec::new();
        let mut degraded = Vec::new();
        let mut unhealthy = Vec::new();

        let mut recovering = self.recovering.lock();
        for name in &self.known_services {
            let present = !self.locator.locate_all(name).is_empty();
            if present {
                if recovering.remove(name) {
                    degraded.push(name.clone());
                } else {
                    healthy.push(name.clone());
                }
            } else {
                recovering.insert(name.clone());
                unhealthy.push(name.clone());
            }
        }
        drop(recovering);

        SystemOverview {
            state,
            healthy,
            degraded,
            unhealthy,
            metrics: self.metrics(),
            recent_errors: self.errors.last(OVERVIEW_ERRORS),
        }
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
