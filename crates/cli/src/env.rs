// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment access for the CLI. Path resolution must match the
//! daemon's so both sides find the same socket.

use std::path::PathBuf;

/// Resolve state directory:
/// `FLO_STATE_DIR` > `XDG_STATE_HOME/flotilla` > `~/.local/state/flotilla`
pub fn state_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("FLO_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("flotilla"));
    }
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("could not determine state directory (HOME unset)"))?;
    Ok(PathBuf::from(home).join(".local/state/flotilla"))
}

pub fn socket_path() -> anyhow::Result<PathBuf> {
    Ok(state_dir()?.join("flod.sock"))
}

/// Explicit daemon binary override for development setups.
pub fn daemon_binary() -> Option<PathBuf> {
    std::env::var("FLO_DAEMON_BINARY").ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
