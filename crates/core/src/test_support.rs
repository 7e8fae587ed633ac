// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared by other crates' tests (feature `test-support`).

use crate::entry::{InstanceStatus, ServiceEntry};
use crate::pipeline::{Pipeline, PipelineStep};

/// A healthy localhost registry entry.
pub fn healthy_entry(name: &str, port: u16) -> ServiceEntry {
    ServiceEntry::new(name, "127.0.0.1", port)
}

/// An entry registered with an explicit status.
pub fn entry_with_status(name: &str, port: u16, status: InstanceStatus) -> ServiceEntry {
    let mut entry = healthy_entry(name, port);
    entry.status = status;
    entry
}

/// A pipeline step with no parameters.
pub fn step(id: &str, service_type: &str, operation: &str, depends_on: &[&str]) -> PipelineStep {
    PipelineStep {
        id: id.to_string(),
        service_type: service_type.to_string(),
        operation: operation.to_string(),
        parameters: Default::default(),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
    }
}

/// A pipeline from pre-built steps; created_at is stamped by the engine.
pub fn pipeline(id: &str, steps: Vec<PipelineStep>) -> Pipeline {
    Pipeline {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        steps,
        created_at_ms: 0,
    }
}
