// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System-level handlers: overview, health, daemon status.

use super::ListenCtx;
use crate::env::PROTOCOL_VERSION;
use flo_core::ServiceState;
use flo_wire::{DaemonStatus, HealthSummary, Response};

pub(super) fn handle_status(ctx: &ListenCtx) -> Response {
    let services_running = ctx
        .orchestrator
        .snapshots()
        .iter()
        .filter(|s| s.state == ServiceState::Running)
        .count();
    Response::Status {
        status: DaemonStatus {
            version: PROTOCOL_VERSION.to_string(),
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            state: ctx.orchestrator.state(),
            services_running,
            pipelines: ctx.pipelines.list().len(),
        },
    }
}

pub(super) fn handle_overview(ctx: &ListenCtx) -> Response {
    Response::Overview {
        overview: ctx.admin.system_overview(ctx.orchestrator.state()),
    }
}

pub(super) fn handle_health(ctx: &ListenCtx) -> Response {
    Response::Health {
        health: HealthSummary {
            state: ctx.orchestrator.state(),
            services: ctx.orchestrator.snapshots(),
        },
    }
}
