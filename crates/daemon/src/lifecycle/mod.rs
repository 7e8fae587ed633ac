// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, file plumbing.

mod startup;
pub use startup::{startup, StartupResult};

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use flo_engine::{Admin, DispatchService, Orchestrator, PipelineEngine};
use flo_registry::{Locator, ServiceRegistry};
use thiserror::Error;
use tracing::{info, warn};

/// Daemon configuration: fixed paths under the state directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/flotilla)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Fixed paths under the user state directory. One daemon serves
    /// the whole host.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self::in_dir(state_dir))
    }

    /// Paths rooted at an explicit directory (tests use a tempdir).
    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("flod.sock"),
            lock_path: state_dir.join("flod.pid"),
            version_path: state_dir.join("flod.version"),
            log_path: state_dir.join("flod.log"),
            state_dir,
        }
    }
}

/// Daemon state during operation.
///
/// All collaborators are built at startup and torn down at shutdown;
/// nothing here is a process-wide singleton.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub registry: Arc<ServiceRegistry>,
    pub locator: Arc<Locator>,
    pub admin: Arc<Admin>,
    pub orchestrator: Arc<Orchestrator>,
    pub dispatch: Arc<DispatchService>,
    pub pipelines: Arc<PipelineEngine>,
    pub start_time: Instant,
}

impl DaemonState {
    /// Shutdown the daemon gracefully: stop the fleet, then remove the
    /// runtime files. Registry and pipeline state is in-memory only
    /// and simply dropped; configuration re-seeds it on next startup.
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        self.orchestrator.stop_all(false).await;

        // The listener task dies with the runtime; its socket, the pid
        // file and the version file must not outlive us on disk.
        let runtime_files = [
            ("socket", &self.config.socket_path),
            ("pid file", &self.config.lock_path),
            ("version file", &self.config.version_path),
        ];
        for (label, path) in runtime_files {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(label, error = %e, "failed to remove runtime file"),
            }
        }

        // The lock itself is released when self.lock_file drops.
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] flo_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
