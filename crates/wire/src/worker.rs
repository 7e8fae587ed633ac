// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Downstream worker wire messages.
//!
//! Workers are opaque endpoints: the control plane only ever sends
//! them a health call or a single operation, framed exactly like the
//! control-plane protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The health status value a live worker must answer with.
pub const SERVING: &str = "serving";

/// Request sent to a worker's RPC port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerRequest {
    /// Standard health call; the rpc probe accepts only [`SERVING`].
    #[serde(rename = "health")]
    Health,

    /// One operation invocation.
    #[serde(rename = "execute")]
    Execute {
        operation: String,
        #[serde(default)]
        payload: serde_json::Value,
        #[serde(default)]
        parameters: HashMap<String, String>,
        request_id: String,
    },
}

/// Worker reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerResponse {
    #[serde(rename = "health")]
    Health { status: String },

    #[serde(rename = "result")]
    Result {
        success: bool,
        #[serde(default)]
        output: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl WorkerResponse {
    /// A passing health reply.
    pub fn serving() -> Self {
        WorkerResponse::Health {
            status: SERVING.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
