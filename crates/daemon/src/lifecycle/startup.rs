// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: single-instance lock, socket binding, component
//! wiring.

use super::{Config, DaemonState, LifecycleError};
use flo_config::FleetConfig;
use flo_engine::{Admin, DispatchService, Orchestrator, PipelineEngine, TcpDispatcher};
use flo_registry::{Locator, ServiceRegistry};
use fs2::FileExt;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UnixListener;
use tracing::info;

/// Result of daemon startup: the state plus the bound listener the
/// caller spawns as a task.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

/// Build the whole control plane.
///
/// Must run inside a tokio runtime (the orchestrator's event bus and
/// the listener are runtime-bound).
pub fn startup(config: &Config, fleet: FleetConfig) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Single-instance lock, held for the daemon's lifetime.
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    std::fs::write(&config.version_path, crate::env::PROTOCOL_VERSION)?;

    // A stale socket from an unclean shutdown would fail the bind.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let registry = Arc::new(ServiceRegistry::new());
    let locator = Arc::new(Locator::new(Arc::clone(&registry)));
    let known = fleet
        .services
        .iter()
        .map(|s| s.short_name.clone())
        .collect();
    let admin = Arc::new(Admin::new(Arc::clone(&locator), known));
    let orchestrator = Orchestrator::new(fleet, Arc::clone(&registry));

    let hook_target = Arc::clone(&orchestrator);
    let dispatch = Arc::new(
        DispatchService::new(
            Arc::clone(&locator),
            Arc::new(TcpDispatcher),
            Arc::clone(&admin),
        )
        .with_error_hook(Arc::new(move |service, message| {
            hook_target.set_service_error(service, message);
        })),
    );
    let pipelines = Arc::new(PipelineEngine::new(Arc::clone(&dispatch)));

    info!(
        socket = %config.socket_path.display(),
        services = orchestrator.config().services.len(),
        "daemon components ready"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            registry,
            locator,
            admin,
            orchestrator,
            dispatch,
            pipelines,
            start_time: Instant::now(),
        },
        listener,
    })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
