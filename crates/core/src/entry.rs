// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery registry entry types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registered health status of a service instance.
///
/// Distinct from the supervisor's lifecycle view: registration status
/// is self-reported by whoever registered the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    #[default]
    Healthy,
    Unhealthy,
    Starting,
    Stopping,
    Unknown,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Healthy => "healthy",
            InstanceStatus::Unhealthy => "unhealthy",
            InstanceStatus::Starting => "starting",
            InstanceStatus::Stopping => "stopping",
            InstanceStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A service instance known to the discovery registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Stable identifier, generated (`svc-…`) when a client registers
    /// without one.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Epoch ms, stamped by the registry at registration.
    #[serde(default)]
    pub registered_at_ms: u64,
    /// Epoch ms, stamped by the registry; always >= registered_at_ms.
    #[serde(default)]
    pub last_heartbeat_ms: u64,
}

impl ServiceEntry {
    /// Minimal entry for registration; the registry fills id and
    /// timestamps.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            version: String::new(),
            host: host.into(),
            port,
            status: InstanceStatus::Healthy,
            metadata: HashMap::new(),
            tags: Vec::new(),
            registered_at_ms: 0,
            last_heartbeat_ms: 0,
        }
    }

    /// `host:port` dial address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
