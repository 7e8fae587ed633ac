// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTOs carried inside requests and responses.

use flo_core::{ErrorEntry, MetricsSnapshot, OrchestratorState, ServiceSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single downstream request routed through the locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Logical service name to resolve.
    pub service_type: String,
    pub operation: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Generated (`req-…`) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Deadline for the whole dispatch; defaults to 30 s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: String,
    pub latency_ms: u64,
}

/// Fleet overview returned by the admin subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemOverview {
    pub state: OrchestratorState,
    /// Logical service names bucketed by trust.
    pub healthy: Vec<String>,
    pub degraded: Vec<String>,
    pub unhealthy: Vec<String>,
    pub metrics: MetricsSnapshot,
    /// Most recent errors, newest last (up to 10).
    pub recent_errors: Vec<ErrorEntry>,
}

/// Orchestrator state plus per-service snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HealthSummary {
    pub state: OrchestratorState,
    pub services: Vec<ServiceSnapshot>,
}

/// Daemon self-status for `flo daemon status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub state: OrchestratorState,
    pub services_running: usize,
    pub pipelines: usize,
}
