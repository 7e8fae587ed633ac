// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle states for managed services and the orchestrator.
//!
//! Two views exist: [`ServiceState`] is the supervisor's internal state
//! machine, and [`ServiceStatus`] is the merged wire-level view that
//! folds the healthy flag into the Running state (`HEALTHY` vs
//! `UNHEALTHY`). Wire discriminants are part of the protocol and must
//! not change.

use serde::{Deserialize, Serialize};

/// Internal lifecycle state of a managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Unknown,
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl ServiceState {
    /// A service in an active state cannot be started again.
    pub fn is_active(self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Running)
    }

    /// Wire-level view of this state given the healthy flag.
    pub fn status(self, healthy: bool) -> ServiceStatus {
        match self {
            ServiceState::Unknown => ServiceStatus::Unknown,
            ServiceState::Stopped => ServiceStatus::Stopped,
            ServiceState::Starting => ServiceStatus::Starting,
            ServiceState::Running if healthy => ServiceStatus::Healthy,
            ServiceState::Running => ServiceStatus::Unhealthy,
            ServiceState::Stopping => ServiceStatus::Stopping,
            ServiceState::Failed => ServiceStatus::Failed,
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceState::Unknown => "unknown",
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
            ServiceState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Wire-level service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServiceStatus {
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "STARTING")]
    Starting,
    #[serde(rename = "HEALTHY")]
    Healthy,
    #[serde(rename = "STOPPING")]
    Stopping,
    #[serde(rename = "STOPPED")]
    Stopped,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "UNHEALTHY")]
    Unhealthy,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Unknown => "UNKNOWN",
            ServiceStatus::Starting => "STARTING",
            ServiceStatus::Healthy => "HEALTHY",
            ServiceStatus::Stopping => "STOPPING",
            ServiceStatus::Stopped => "STOPPED",
            ServiceStatus::Failed => "FAILED",
            ServiceStatus::Unhealthy => "UNHEALTHY",
        };
        write!(f, "{s}")
    }
}

/// Wire-level orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrchestratorState {
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "STARTING")]
    Starting,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "STOPPING")]
    Stopping,
    #[serde(rename = "STOPPED")]
    Stopped,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrchestratorState::Unknown => "UNKNOWN",
            OrchestratorState::Starting => "STARTING",
            OrchestratorState::Running => "RUNNING",
            OrchestratorState::Stopping => "STOPPING",
            OrchestratorState::Stopped => "STOPPED",
        };
        write!(f, "{s}")
    }
}

/// Coherent point-in-time snapshot of a managed service.
///
/// Produced under the per-service lock so state, pid and timestamps
/// are never torn across fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub state: ServiceState,
    pub status: ServiceStatus,
    /// Process-group id when running and owned; 0 for adopted
    /// processes whose real pid is unknown.
    pub pid: u32,
    /// Epoch ms; 0 when not running.
    pub started_at_ms: u64,
    pub restart_count: u32,
    pub healthy: bool,
    pub adopted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Epoch ms of the most recent probe; 0 before the first probe.
    #[serde(default)]
    pub last_health_check_ms: u64,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
