// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The discovery registry: id-keyed service instances with
//! heartbeat-driven liveness timestamps.

use flo_core::clock::{Clock, SystemClock};
use flo_core::entry::{InstanceStatus, ServiceEntry};
use flo_core::id;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

/// Registry operation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no registry entry with id {0:?}")]
    NotFound(String),
}

/// In-memory instance registry.
///
/// All operations are linearizable under the single writer lock;
/// reads take the shared side. Entries survive until explicit
/// deregistration; there is no background expiry.
pub struct ServiceRegistry<C: Clock = SystemClock> {
    entries: RwLock<HashMap<String, ServiceEntry>>,
    clock: C,
}

impl ServiceRegistry<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ServiceRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ServiceRegistry<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Upsert an entry. A missing id is generated; registration and
    /// heartbeat timestamps are stamped with the current time.
    /// Returns the stored entry.
    pub fn register(&self, mut entry: ServiceEntry) -> ServiceEntry {
        if entry.id.is_empty() {
            entry.id = id::generate(id::INSTANCE_PREFIX);
        }
        let now = self.clock.epoch_ms();
        entry.registered_at_ms = now;
        entry.last_heartbeat_ms = now;

        tracing::debug!(id = %entry.id, name = %entry.name, port = entry.port, "registered instance");
        self.entries.write().insert(entry.id.clone(), entry.clone());
        entry
    }

    /// Remove an entry. Succeeds whether or not the id was present.
    pub fn deregister(&self, id: &str) {
        if self.entries.write().remove(id).is_some() {
            tracing::debug!(id, "deregistered instance");
        }
    }

    /// Refresh an entry's liveness timestamp.
    pub fn heartbeat(&self, id: &str) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        entry.last_heartbeat_ms = self.clock.epoch_ms();
        Ok(())
    }

    /// All healthy entries for a logical service name, in unspecified
    /// order.
    pub fn discover(&self, name: &str) -> Vec<ServiceEntry> {
        self.entries
            .read()
            .values()
            .filter(|e| e.name == name && e.status == InstanceStatus::Healthy)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<ServiceEntry, RegistryError> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<ServiceEntry> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
