// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::types::{DaemonStatus, DispatchResponse, HealthSummary, SystemOverview};
use flo_core::{
    ErrorEntry, ErrorKind, MetricsSnapshot, Pipeline, PipelineExecution, ServiceEntry,
    ServiceEvent, ServiceSnapshot,
};
use serde::{Deserialize, Serialize};

/// Response from the daemon to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon is shutting down
    ShuttingDown,

    /// Daemon self-status
    Status { status: DaemonStatus },

    /// Lifecycle operation accepted; `success` is false when the
    /// orchestrator tried and the underlying service refused.
    Lifecycle { success: bool, message: String },

    /// Single managed-service snapshot
    Service { service: ServiceSnapshot },

    /// All managed-service snapshots
    Services { services: Vec<ServiceSnapshot> },

    /// Single registry entry (register/get)
    Entry { entry: ServiceEntry },

    /// Registry entries (discover/list)
    Entries { entries: Vec<ServiceEntry> },

    /// Fleet overview
    Overview { overview: SystemOverview },

    /// Orchestrator health summary
    Health { health: HealthSummary },

    /// Request metrics snapshot
    Metrics { metrics: MetricsSnapshot },

    /// Recent error history, newest last
    Errors { errors: Vec<ErrorEntry> },

    /// Single pipeline definition
    Pipeline { pipeline: Pipeline },

    /// All pipeline definitions
    Pipelines { pipelines: Vec<Pipeline> },

    /// Single execution record
    Execution { execution: PipelineExecution },

    /// All execution records
    Executions { executions: Vec<PipelineExecution> },

    /// Dispatch outcome
    Dispatch { response: DispatchResponse },

    /// One streamed lifecycle event (StreamStatus connections only)
    Event { event: ServiceEvent },

    /// Error response carrying the taxonomy kind
    Error { kind: ErrorKind, message: String },
}

impl Response {
    /// Error response helper.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }

    /// InvalidArgument shorthand used by request validation.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::InvalidArgument, message)
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
