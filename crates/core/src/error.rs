// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy surfaced uniformly across the control plane.
//!
//! Each kind maps onto one RPC status code on the wire. Crate-local
//! error enums (config, supervisor, engine, protocol) convert into a
//! kind at the facade boundary.

use serde::{Deserialize, Serialize};

/// Uniform error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request validation failed (empty name, unknown field value).
    InvalidArgument,
    /// Unknown identifier (service, pipeline, registry entry).
    NotFound,
    /// Start requested for a service already Starting or Running.
    AlreadyActive,
    /// Internal-dependency wait timed out, or a pipeline step's
    /// dependency produced no output.
    DependencyUnsatisfied,
    /// Required external probe failed at startup.
    ExternalDependencyUnavailable,
    /// Occupying process could not be adopted or evicted.
    PortConflict,
    /// Start retries exhausted.
    StartFailed,
    /// A deadline elapsed.
    DeadlineExceeded,
    /// Cooperative cancellation observed.
    Cancelled,
    /// Everything else; accompanied by a log line.
    Internal,
}

impl ErrorKind {
    /// Stable wire code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyActive => "already_active",
            ErrorKind::DependencyUnsatisfied => "dependency_unsatisfied",
            ErrorKind::ExternalDependencyUnavailable => "external_dependency_unavailable",
            ErrorKind::PortConflict => "port_conflict",
            ErrorKind::StartFailed => "start_failed",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
