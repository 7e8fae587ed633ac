// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service lifecycle handlers.
//!
//! Two failure channels, deliberately distinct: validation errors
//! (unknown service, already active) use the error response, while
//! accepted-but-failed operations return `Lifecycle { success: false }`:
//! the orchestrator tried and the service refused.

use super::ListenCtx;
use flo_core::ErrorKind;
use flo_engine::OrchestratorError;
use flo_wire::Response;
use tokio_util::sync::CancellationToken;

pub(super) async fn handle_start_all(ctx: &ListenCtx, cancel: &CancellationToken) -> Response {
    match ctx.orchestrator.start_all(cancel).await {
        Ok(()) => Response::Lifecycle {
            success: true,
            message: "fleet running".to_string(),
        },
        Err(e) => lifecycle_failure(ctx, "start_all", e),
    }
}

pub(super) async fn handle_stop_all(ctx: &ListenCtx, force: bool) -> Response {
    ctx.orchestrator.stop_all(force).await;
    Response::Lifecycle {
        success: true,
        message: "fleet stopped".to_string(),
    }
}

pub(super) async fn handle_start(ctx: &ListenCtx, service: &str) -> Response {
    match ctx.orchestrator.start_service(service).await {
        Ok(()) => Response::Lifecycle {
            success: true,
            message: format!("{service} running"),
        },
        Err(e) => lifecycle_failure(ctx, "start", e),
    }
}

pub(super) async fn handle_stop(ctx: &ListenCtx, service: &str, force: bool) -> Response {
    match ctx.orchestrator.stop_service(service, force).await {
        Ok(()) => Response::Lifecycle {
            success: true,
            message: format!("{service} stopped"),
        },
        Err(e) => lifecycle_failure(ctx, "stop", e),
    }
}

pub(super) async fn handle_restart(ctx: &ListenCtx, service: &str) -> Response {
    match ctx.orchestrator.restart_service(service).await {
        Ok(()) => Response::Lifecycle {
            success: true,
            message: format!("{service} restarted"),
        },
        Err(e) => lifecycle_failure(ctx, "restart", e),
    }
}

pub(super) fn handle_service_status(ctx: &ListenCtx, service: &str) -> Response {
    match ctx.orchestrator.snapshot(service) {
        Ok(snapshot) => Response::Service { service: snapshot },
        Err(e) => Response::error(e.kind(), e.to_string()),
    }
}

/// Route an orchestrator failure to the right channel.
///
/// Validation and not-found failures return immediately with no side
/// effects; accepted-but-failed operations are recorded in the admin
/// error ring before being reported.
fn lifecycle_failure(ctx: &ListenCtx, operation: &str, error: OrchestratorError) -> Response {
    let kind = error.kind();
    match kind {
        // The request itself was unacceptable.
        ErrorKind::NotFound | ErrorKind::AlreadyActive | ErrorKind::Cancelled => {
            Response::error(kind, error.to_string())
        }
        // Accepted, attempted, refused.
        _ => {
            let service = match &error {
                OrchestratorError::DependencyTimeout { service: name, .. }
                | OrchestratorError::PortConflict { service: name, .. }
                | OrchestratorError::StartFailed { service: name, .. } => name.clone(),
                _ => String::new(),
            };
            ctx.admin
                .record_error(&service, operation, kind, &error.to_string(), "");
            Response::Lifecycle {
                success: false,
                message: error.to_string(),
            }
        }
    }
}
