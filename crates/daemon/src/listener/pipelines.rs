// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline CRUD and execution handlers.

use super::ListenCtx;
use flo_core::{ErrorKind, Pipeline};
use flo_engine::PipelineError;
use flo_wire::Response;
use tokio_util::sync::CancellationToken;

fn kind_of(error: &PipelineError) -> ErrorKind {
    match error {
        PipelineError::MissingId | PipelineError::DuplicateStep(_) => ErrorKind::InvalidArgument,
        PipelineError::NotFound(_) | PipelineError::ExecutionNotFound(_) => ErrorKind::NotFound,
    }
}

// Pipeline registry failures are all validation or not-found: they
// return immediately with no side effects (step failures inside an
// execution are recorded by dispatch instead).
fn failure(error: PipelineError) -> Response {
    Response::error(kind_of(&error), error.to_string())
}

pub(super) fn handle_create(ctx: &ListenCtx, pipeline: Pipeline) -> Response {
    match ctx.pipelines.register(pipeline) {
        Ok(stored) => Response::Pipeline { pipeline: stored },
        Err(e) => failure(e),
    }
}

pub(super) fn handle_get(ctx: &ListenCtx, id: &str) -> Response {
    match ctx.pipelines.get(id) {
        Ok(pipeline) => Response::Pipeline { pipeline },
        Err(e) => failure(e),
    }
}

pub(super) fn handle_delete(ctx: &ListenCtx, id: &str) -> Response {
    match ctx.pipelines.delete(id) {
        Ok(()) => Response::Ok,
        Err(e) => failure(e),
    }
}

pub(super) async fn handle_execute(
    ctx: &ListenCtx,
    id: &str,
    input: serde_json::Value,
    cancel: &CancellationToken,
) -> Response {
    match ctx.pipelines.execute(id, input, cancel).await {
        Ok(execution) => Response::Execution { execution },
        Err(e) => failure(e),
    }
}

pub(super) fn handle_get_execution(ctx: &ListenCtx, id: &str) -> Response {
    match ctx.pipelines.get_execution(id) {
        Ok(execution) => Response::Execution { execution },
        Err(e) => failure(e),
    }
}
