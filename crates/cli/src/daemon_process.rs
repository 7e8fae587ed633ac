// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management: locate `flod`, spawn it detached, wait
//! for its READY handshake line.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// How long to wait for READY after spawning.
const STARTUP_WAIT: Duration = Duration::from_secs(10);

/// Locate the daemon binary: explicit override, then a sibling of the
/// CLI binary, then PATH.
fn find_daemon_binary() -> PathBuf {
    if let Some(explicit) = crate::env::daemon_binary() {
        return explicit;
    }
    if let Ok(current) = std::env::current_exe() {
        let sibling = current.with_file_name("flod");
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from("flod")
}

/// Spawn the daemon when the socket is absent and wait until it
/// answers READY.
pub async fn ensure_running(socket_path: &Path) -> Result<()> {
    if socket_path.exists() {
        return Ok(());
    }

    let binary = find_daemon_binary();
    let mut child = tokio::process::Command::new(&binary)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn daemon {}", binary.display()))?;

    let stdout = child
        .stdout
        .take()
        .context("daemon stdout unavailable")?;
    let mut lines = BufReader::new(stdout).lines();

    let ready = tokio::time::timeout(STARTUP_WAIT, async {
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim() == "READY" {
                return true;
            }
        }
        false
    })
    .await;

    match ready {
        Ok(true) => {
            // The daemon owns its own lifetime from here; keep reading
            // nothing, just let the pipe close with us.
            eprintln!("started flod ({})", binary.display());
            Ok(())
        }
        Ok(false) => bail!("flod exited before becoming ready"),
        Err(_) => bail!("flod did not become ready within {STARTUP_WAIT:?}"),
    }
}
