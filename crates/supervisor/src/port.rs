// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port occupancy helpers for conflict arbitration.
//!
//! Before spawning a service the orchestrator dials its primary port;
//! an answer means some process already holds it. Adoption is tried
//! first (engine policy); eviction lives here because it needs the
//! same signalling machinery as the supervisor.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

/// Dial timeout for the occupancy check.
pub const DIAL_TIMEOUT: Duration = Duration::from_millis(500);

/// Wait for the port to free after SIGTERM.
pub const TERM_WAIT: Duration = Duration::from_secs(5);

/// Wait for the port to free after SIGKILL.
pub const KILL_WAIT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Eviction failures.
#[derive(Debug, Error)]
pub enum EvictError {
    #[error("port {0} did not free after terminating its holder")]
    StillHeld(u16),
}

/// True when something accepts a TCP dial on `localhost:<port>`.
pub async fn is_port_open(port: u16) -> bool {
    matches!(
        tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}

/// Poll until the port stops accepting dials or `wait` elapses.
pub async fn wait_port_free(port: u16, wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        if !is_port_open(port).await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Best-effort lookup of the pid listening on a TCP port, via lsof.
pub async fn find_listener_pid(port: u16) -> Option<i32> {
    let output = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::process::Command::new("lsof")
            .args(["-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .and_then(|line| line.trim().parse().ok())
}

/// Evict whatever holds the port: SIGTERM the holder (when it can be
/// identified), wait for the port to free, escalate to SIGKILL, wait
/// again. Fails when the port is still held afterwards.
pub async fn evict_listener(port: u16) -> Result<(), EvictError> {
    let pid = find_listener_pid(port).await;
    tracing::info!(port, ?pid, "evicting port holder");

    if let Some(pid) = pid {
        let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
    }
    if wait_port_free(port, TERM_WAIT).await {
        return Ok(());
    }

    // Re-resolve: the holder may have respawned or forked.
    let pid = find_listener_pid(port).await.or(pid);
    if let Some(pid) = pid {
        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
    }
    if wait_port_free(port, KILL_WAIT).await {
        return Ok(());
    }

    Err(EvictError::StillHeld(port))
}

#[cfg(test)]
#[path = "port_tests.rs"]
mod tests;
