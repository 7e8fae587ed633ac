// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-through TTL cache over the registry.
//!
//! The dispatch hot path must not serialise against registration
//! mutations; bounded staleness is acceptable by contract.

use crate::registry::ServiceRegistry;
use flo_core::clock::{Clock, SystemClock};
use flo_core::entry::ServiceEntry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default snapshot TTL.
pub const DEFAULT_LOCATOR_TTL: Duration = Duration::from_secs(30);

/// Locator failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("no healthy instance of service {0:?}")]
    NoHealthyInstance(String),
}

struct CachedSnapshot {
    entries: Vec<ServiceEntry>,
    refreshed_at: Instant,
}

/// TTL-bounded read-through cache keyed by logical service name.
pub struct Locator<C: Clock = SystemClock> {
    registry: Arc<ServiceRegistry<C>>,
    cache: Mutex<HashMap<String, CachedSnapshot>>,
    ttl: Duration,
    clock: C,
}

impl Locator<SystemClock> {
    pub fn new(registry: Arc<ServiceRegistry<SystemClock>>) -> Self {
        Self::with_clock(registry, DEFAULT_LOCATOR_TTL, SystemClock)
    }
}

impl<C: Clock> Locator<C> {
    pub fn with_clock(registry: Arc<ServiceRegistry<C>>, ttl: Duration, clock: C) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// All healthy instances of `name`, served from the cached
    /// snapshot while it is younger than the TTL.
    pub fn locate_all(&self, name: &str) -> Vec<ServiceEntry> {
        let now = self.clock.now();

        {
            let cache = self.cache.lock();
            if let Some(snapshot) = cache.get(name) {
                if now.duration_since(snapshot.refreshed_at) < self.ttl {
                    return snapshot.entries.clone();
                }
            }
        }

        // Miss or stale: refresh outside any registry lock interplay,
        // then publish the new snapshot.
        let entries = self.registry.discover(name);
        self.cache.lock().insert(
            name.to_string(),
            CachedSnapshot {
                entries: entries.clone(),
                refreshed_at: now,
            },
        );
        entries
    }

    /// First healthy instance of `name`. Selection is deterministically
    /// "first returned".
    pub fn locate(&self, name: &str) -> Result<ServiceEntry, LocateError> {
        self.locate_all(name)
            .into_iter()
            .next()
            .ok_or_else(|| LocateError::NoHealthyInstance(name.to_string()))
    }

    /// Drop the snapshot for one name; the next query refills it.
    pub fn invalidate(&self, name: &str) {
        self.cache.lock().remove(name);
    }

    /// Drop all snapshots.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// The registry this locator reads through.
    pub fn registry(&self) -> &Arc<ServiceRegistry<C>> {
        &self.registry
    }
}

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;
