// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery registry handlers.

use super::ListenCtx;
use flo_core::{ErrorKind, ServiceEntry};
use flo_wire::Response;

pub(super) fn handle_register(ctx: &ListenCtx, entry: ServiceEntry) -> Response {
    if entry.name.trim().is_empty() {
        return Response::invalid("entry name must not be empty");
    }
    if entry.host.trim().is_empty() {
        return Response::invalid("entry host must not be empty");
    }
    if entry.port == 0 {
        return Response::invalid("entry port must not be zero");
    }
    let stored = ctx.registry.register(entry);
    Response::Entry { entry: stored }
}

pub(super) fn handle_deregister(ctx: &ListenCtx, id: &str) -> Response {
    if id.trim().is_empty() {
        return Response::invalid("id must not be empty");
    }
    ctx.registry.deregister(id);
    Response::Ok
}

pub(super) fn handle_heartbeat(ctx: &ListenCtx, id: &str) -> Response {
    if id.trim().is_empty() {
        return Response::invalid("id must not be empty");
    }
    match ctx.registry.heartbeat(id) {
        Ok(()) => Response::Ok,
        Err(e) => Response::error(ErrorKind::NotFound, e.to_string()),
    }
}

/// Discovery reads go through the locator's TTL cache, not the
/// registry directly, so dispatch and clients see the same snapshots.
pub(super) fn handle_discover(ctx: &ListenCtx, name: &str) -> Response {
    if name.trim().is_empty() {
        return Response::invalid("name must not be empty");
    }
    Response::Entries {
        entries: ctx.locator.locate_all(name),
    }
}

pub(super) fn handle_get(ctx: &ListenCtx, id: &str) -> Response {
    match ctx.registry.get(id) {
        Ok(entry) => Response::Entry { entry },
        Err(e) => Response::error(ErrorKind::NotFound, e.to_string()),
    }
}
