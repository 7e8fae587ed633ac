// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::types::DispatchRequest;
use flo_core::{Pipeline, ServiceEntry};
use serde::{Deserialize, Serialize};

/// Request from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Daemon self-status
    Status,

    /// Request daemon shutdown
    Shutdown,

    // -- service lifecycle --
    /// Start every enabled service in dependency order
    StartAll,

    /// Stop the whole fleet in reverse start order
    StopAll {
        #[serde(default)]
        force: bool,
    },

    /// Start one managed service
    StartService { service: String },

    /// Stop one managed service
    StopService {
        service: String,
        #[serde(default)]
        force: bool,
    },

    /// Stop then start one managed service
    RestartService { service: String },

    /// Snapshot of one managed service
    ServiceStatus { service: String },

    /// Snapshots of every managed service
    ListServices,

    /// Stream lifecycle events until the client disconnects.
    ///
    /// Connection-upgrading: after this request the daemon writes a
    /// sequence of `Response::Event` frames instead of a single
    /// response.
    StreamStatus,

    // -- discovery registry --
    Register { entry: ServiceEntry },

    Deregister { id: String },

    Heartbeat { id: String },

    Discover { name: String },

    GetEntry { id: String },

    ListEntries,

    // -- system --
    Overview,

    Health,

    Metrics,

    ListErrors {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },

    // -- pipelines --
    CreatePipeline { pipeline: Pipeline },

    GetPipeline { id: String },

    ListPipelines,

    DeletePipeline { id: String },

    ExecutePipeline {
        id: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    GetExecution { id: String },

    ListExecutions,

    // -- dispatch --
    /// Forward a single request to one downstream worker
    Execute { request: DispatchRequest },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
