// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events emitted on every managed-service transition.

use crate::state::ServiceStatus;
use serde::{Deserialize, Serialize};

/// A single lifecycle transition observed by the supervisor.
///
/// For one service, consecutive events chain: each event's `previous`
/// equals the `current` of the event before it. Advisory notifications
/// that do not change state (health probe outcomes) carry
/// `previous == current` so the chain is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub service: String,
    pub previous: ServiceStatus,
    pub current: ServiceStatus,
    pub message: String,
    pub timestamp_ms: u64,
}

impl ServiceEvent {
    pub fn new(
        service: impl Into<String>,
        previous: ServiceStatus,
        current: ServiceStatus,
        message: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            service: service.into(),
            previous,
            current,
            message: message.into(),
            timestamp_ms,
        }
    }
}

impl std::fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}: {} -> {}", self.service, self.previous, self.current)
        } else {
            write!(
                f,
                "{}: {} -> {} ({})",
                self.service, self.previous, self.current, self.message
            )
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
