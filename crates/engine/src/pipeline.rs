// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline engine: named workflows of dispatch steps with inter-step
//! data flow.
//!
//! Steps run strictly sequentially in declared order for
//! reproducibility; the step list is required to be topologically
//! admissible, and a dependency whose output is missing at run time
//! fails the execution. Executions are retained in memory, unbounded.

use crate::dispatch::DispatchService;
use flo_core::{
    Clock, ExecutionStatus, Pipeline, PipelineExecution, StepResult, StepStatus, SystemClock,
};
use flo_wire::DispatchRequest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Pipeline registry failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline id must not be empty")]
    MissingId,

    #[error("duplicate step id {0:?}")]
    DuplicateStep(String),

    #[error("no pipeline with id {0:?}")]
    NotFound(String),

    #[error("no execution with id {0:?}")]
    ExecutionNotFound(String),
}

pub struct PipelineEngine {
    dispatch: Arc<DispatchService>,
    pipelines: Mutex<HashMap<String, Pipeline>>,
    executions: Mutex<HashMap<String, PipelineExecution>>,
    execution_seq: AtomicU64,
}

impl PipelineEngine {
    pub fn new(dispatch: Arc<DispatchService>) -> Self {
        Self {
            dispatch,
            pipelines: Mutex::new(HashMap::new()),
            executions: Mutex::new(HashMap::new()),
            execution_seq: AtomicU64::new(0),
        }
    }

    /// Store a pipeline. Dependencies are checked at execution time;
    /// registration only requires an id and unique step ids.
    pub fn register(&self, mut pipeline: Pipeline) -> Result<Pipeline, PipelineError> {
        if pipeline.id.trim().is_empty() {
            return Err(PipelineError::MissingId);
        }
        let mut seen = std::collections::HashSet::new();
        for step in &pipeline.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(PipelineError::DuplicateStep(step.id.clone()));
            }
        }
        pipeline.created_at_ms = SystemClock.epoch_ms();
        self.pipelines
            .lock()
            .insert(pipeline.id.clone(), pipeline.clone());
        tracing::info!(id = %pipeline.id, steps = pipeline.steps.len(), "pipeline registered");
        Ok(pipeline)
    }

    pub fn get(&self, id: &str) -> Result<Pipeline, PipelineError> {
        self.pipelines
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    /// All pipelines, ordered by creation time then id.
    pub fn list(&self) -> Vec<Pipeline> {
        let mut pipelines: Vec<Pipeline> = self.pipelines.lock().values().cloned().collect();
        pipelines.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        pipelines
    }

    pub fn delete(&self, id: &str) -> Result<(), PipelineError> {
        self.pipelines
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    pub fn get_execution(&self, id: &str) -> Result<PipelineExecution, PipelineError> {
        self.executions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::ExecutionNotFound(id.to_string()))
    }

    /// All executions, oldest first.
    pub fn list_executions(&self) -> Vec<PipelineExecution> {
        let mut executions: Vec<PipelineExecution> =
            self.executions.lock().values().cloned().collect();
        executions.sort_by(|a, b| {
            a.started_at_ms
                .cmp(&b.started_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        executions
    }

    /// Run a pipeline to completion. Step failures are reported in the
    /// returned execution record, not as an `Err`; errors are reserved
    /// for unknown pipeline ids.
    pub async fn execute(
        &self,
        id: &str,
        input: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<PipelineExecution, PipelineError> {
        let pipeline = self.get(id)?;

        let seq = self.execution_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut execution = PipelineExecution {
            id: format!("exec-{seq}"),
            pipeline_id: pipeline.id.clone(),
            status: ExecutionStatus::Running,
            started_at_ms: SystemClock.epoch_ms(),
            completed_at_ms: 0,
            steps: Vec::new(),
            error: None,
            output: serde_json::Value::Null,
        };
        self.store(&execution);

        let mut outputs: HashMap<String, serde_json::Value> = HashMap::new();
        outputs.insert("input".to_string(), input.clone());
        let mut final_output = input.clone();

        for step in &pipeline.steps {
            if cancel.is_cancelled() {
                execution.status = ExecutionStatus::Cancelled;
                execution.error = Some("cancelled".to_string());
                execution.completed_at_ms = SystemClock.epoch_ms();
                self.store(&execution);
                return Ok(execution);
            }

            // Every declared dependency must already have produced an
            // output.
            if let Some(missing) = step.depends_on.iter().find(|d| !outputs.contains_key(*d)) {
                let message =
                    format!("step {:?}: dependency not satisfied: {missing:?}", step.id);
                execution.steps.push(StepResult {
                    step_id: step.id.clone(),
                    status: StepStatus::Failed,
                    started_at_ms: SystemClock.epoch_ms(),
                    completed_at_ms: SystemClock.epoch_ms(),
                    output: serde_json::Value::Null,
                    error: Some(message.clone()),
                });
                return Ok(self.fail(execution, message));
            }

            let step_input = if step.depends_on.is_empty() {
                serde_json::json!({ "input": input })
            } else {
                let mut map = serde_json::Map::new();
                for dep in &step.depends_on {
                    if let Some(value) = outputs.get(dep) {
                        map.insert(dep.clone(), value.clone());
                    }
                }
                serde_json::Value::Object(map)
            };

            let mut result = StepResult {
                step_id: step.id.clone(),
                status: StepStatus::Running,
                started_at_ms: SystemClock.epoch_ms(),
                completed_at_ms: 0,
                output: serde_json::Value::Null,
                error: None,
            };

            let request = DispatchRequest {
                service_type: step.service_type.clone(),
                operation: step.operation.clone(),
                payload: step_input,
                parameters: step.parameters.clone(),
                request_id: None,
                timeout_ms: None,
            };

            match self.dispatch.execute(request, cancel).await {
                Ok(response) if response.success => {
                    result.status = StepStatus::Completed;
                    result.completed_at_ms = SystemClock.epoch_ms();
                    result.output = response.output.clone();
                    outputs.insert(step.id.clone(), response.output.clone());
                    final_output = response.output;
                    execution.steps.push(result);
                    self.store(&execution);
                }
                Ok(response) => {
                    let message = response
                        .error
                        .unwrap_or_else(|| format!("step {:?} refused", step.id));
                    result.status = StepStatus::Failed;
                    result.completed_at_ms = SystemClock.epoch_ms();
                    result.error = Some(message.clone());
                    execution.steps.push(result);
                    return Ok(self.fail(execution, message));
                }
                Err(e) => {
                    let message = format!("step {:?}: {e}", step.id);
                    result.status = StepStatus::Failed;
                    result.completed_at_ms = SystemClock.epoch_ms();
                    result.error = Some(message.clone());
                    execution.steps.push(result);
                    return Ok(self.fail(execution, message));
                }
            }
        }

        execution.status = ExecutionStatus::Completed;
        execution.completed_at_ms = SystemClock.epoch_ms();
        execution.output = final_output;
        self.store(&execution);
        Ok(execution)
    }

    fn fail(&self, mut execution: PipelineExecution, message: String) -> PipelineExecution {
        tracing::warn!(execution = %execution.id, %message, "pipeline execution failed");
        execution.status = ExecutionStatus::Failed;
        execution.error = Some(message);
        execution.completed_at_ms = SystemClock.epoch_ms();
        self.store(&execution);
        execution
    }

    fn store(&self, execution: &PipelineExecution) {
        self.executions
            .lock()
            .insert(execution.id.clone(), execution.clone());
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
