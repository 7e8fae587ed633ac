// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline definitions and execution records.
//!
//! A pipeline is a named, DAG-structured composition of dispatches
//! with inter-step data flow. Definitions are declared by clients;
//! execution records are produced by the engine and immutable once
//! terminal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One dispatch step in a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Unique within the pipeline.
    pub id: String,
    /// Logical service name the step dispatches to.
    pub service_type: String,
    pub operation: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Step ids whose outputs feed this step. Must appear earlier in
    /// the step list.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A named workflow of dispatch steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<PipelineStep>,
    /// Epoch ms, stamped at registration.
    #[serde(default)]
    pub created_at_ms: u64,
}

/// Execution status; Completed/Failed/Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Per-step outcome within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub started_at_ms: u64,
    #[serde(default)]
    pub completed_at_ms: u64,
    /// Opaque worker output; propagated to dependent steps.
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One run of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExecution {
    /// `exec-<monotonic>`.
    pub id: String,
    pub pipeline_id: String,
    pub status: ExecutionStatus,
    pub started_at_ms: u64,
    #[serde(default)]
    pub completed_at_ms: u64,
    /// Results in declared step order; only executed steps appear.
    #[serde(default)]
    pub steps: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Output of the final step on success.
    #[serde(default)]
    pub output: serde_json::Value,
}
