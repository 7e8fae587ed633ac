// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory:
/// `FLO_STATE_DIR` > `XDG_STATE_HOME/flotilla` > `~/.local/state/flotilla`
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FLO_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("flotilla"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/flotilla"))
}

/// Default IPC timeout, overridable via `FLO_IPC_TIMEOUT_MS`.
pub fn ipc_timeout() -> Duration {
    std::env::var("FLO_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Fleet configuration path: `FLO_CONFIG` when set, else
/// `flotilla.toml` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var("FLO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("flotilla.toml"))
}

/// True when `FLO_CONFIG` was explicitly provided (a missing explicit
/// file is a startup error; a missing default is an empty fleet).
pub fn config_is_explicit() -> bool {
    std::env::var("FLO_CONFIG").is_ok()
}
