// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-service lifecycle state machine.
//!
//! ```text
//!     Stopped ──start──▶ Starting ──probe ok──▶ Running
//!        ▲                  │                      │
//!        │                  │ exit                 │ stop
//!        │                  ▼                      ▼
//!        └──────────────  Failed ◀───crash──── Stopping ──▶ Stopped
//! ```
//!
//! One mutex guards all mutable fields, so snapshots are never torn
//! across state, pid and timestamps. The monitor task owns the child
//! handle; transitions it performs are guarded by a spawn epoch so a
//! stale monitor from a previous child can never clobber the state of
//! a newer one.

use crate::events::EventEmitter;
use flo_config::ServiceDef;
use flo_core::{Clock, ServiceEvent, ServiceSnapshot, ServiceState, SystemClock};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Wait after SIGKILL for the process group to disappear.
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Supervisor-level failures.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("service {0:?} is already active")]
    AlreadyActive(String),

    #[error("failed to spawn {service:?}: {source}")]
    SpawnFailed {
        service: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
struct Inner {
    state: ServiceState,
    /// Process-group id of the owned child (equals its pid).
    pgid: Option<i32>,
    /// Pid observed at adoption; stop signals it best-effort.
    adopted_pid: Option<i32>,
    adopted: bool,
    started_at_ms: u64,
    restart_count: u32,
    healthy: bool,
    last_error: Option<String>,
    last_health_check_ms: u64,
    /// Incremented on every spawn/adopt; stale monitor tasks bail out.
    child_epoch: u64,
    /// What the monitor should land on when the child exits while
    /// Stopping: Stopped for a graceful or requested-force stop,
    /// Failed when the graceful phase had to escalate to SIGKILL.
    stop_target: ServiceState,
}

/// A configured worker process under orchestrator control.
pub struct ManagedService {
    def: ServiceDef,
    program: String,
    args: Vec<String>,
    log_path: Option<PathBuf>,
    events: EventEmitter,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ServiceState>,
    /// Self-handle for the monitor task spawned by `start`.
    weak: std::sync::Weak<Self>,
}

impl ManagedService {
    pub fn new(
        def: ServiceDef,
        binary_path: &Path,
        log_dir: Option<&Path>,
        events: EventEmitter,
    ) -> Arc<Self> {
        let argv = def.effective_command(binary_path);
        let (program, args) = match argv.split_first() {
            Some((p, rest)) => (p.clone(), rest.to_vec()),
            None => (
                binary_path.display().to_string(),
                vec!["serve".to_string(), def.short_name.clone()],
            ),
        };
        let log_path = log_dir.map(|d| d.join(format!("{}.log", def.short_name)));
        let (state_tx, _) = watch::channel(ServiceState::Stopped);

        Arc::new_cyclic(|weak| Self {
            def,
            program,
            args,
            log_path,
            events,
            inner: Mutex::new(Inner {
                state: ServiceState::Stopped,
                pgid: None,
                adopted_pid: None,
                adopted: false,
                started_at_ms: 0,
                restart_count: 0,
                healthy: false,
                last_error: None,
                last_health_check_ms: 0,
                child_epoch: 0,
                stop_target: ServiceState::Stopped,
            }),
            state_tx,
            weak: weak.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.def.short_name
    }

    pub fn def(&self) -> &ServiceDef {
        &self.def
    }

    pub fn state(&self) -> ServiceState {
        self.inner.lock().state
    }

    pub fn is_adopted(&self) -> bool {
        self.inner.lock().adopted
    }

    pub fn restart_count(&self) -> u32 {
        self.inner.lock().restart_count
    }

    /// Bump the lifetime restart counter; never reset.
    pub fn increment_restart_count(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.restart_count += 1;
        inner.restart_count
    }

    pub fn set_last_error(&self, message: &str) {
        self.inner.lock().last_error = Some(message.to_string());
    }

    /// Watch state transitions (used by dependency waits and stop).
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.state_tx.subscribe()
    }

    /// Coherent point-in-time snapshot.
    pub fn snapshot(&self) -> ServiceSnapshot {
        let inner = self.inner.lock();
        ServiceSnapshot {
            name: self.def.short_name.clone(),
            state: inner.state,
            status: inner.state.status(inner.healthy),
            pid: inner.pgid.unwrap_or(0) as u32,
            started_at_ms: inner.started_at_ms,
            restart_count: inner.restart_count,
            healthy: inner.healthy,
            adopted: inner.adopted,
            last_error: inner.last_error.clone(),
            last_health_check_ms: inner.last_health_check_ms,
        }
    }

    /// Spawn the child in a fresh process group and enter Starting.
    ///
    /// Promotion to Running is probe-driven by the orchestrator via
    /// [`ManagedService::mark_running`].
    pub fn start(&self) -> Result<(), SupervisorError> {
        let epoch = {
            let mut inner = self.inner.lock();
            if inner.state.is_active() || inner.state == ServiceState::Stopping {
                return Err(SupervisorError::AlreadyActive(self.def.short_name.clone()));
            }
            inner.child_epoch += 1;
            inner.child_epoch
        };

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            // The whole subtree must be reachable by one signal.
            .process_group(0);
        match self.open_log() {
            Some((out, err)) => {
                command.stdout(out).stderr(err);
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }
        // The child's lifetime is the orchestrator's, never the
        // requesting client's: a disconnect or deadline cancels the
        // dispatch, not the fleet. No request token reaches this spawn.
        command.kill_on_drop(false);

        let mut child = command.spawn().map_err(|source| {
            let message = source.to_string();
            self.set_last_error(&message);
            SupervisorError::SpawnFailed {
                service: self.def.short_name.clone(),
                source,
            }
        })?;
        let pid = child.id().unwrap_or_default() as i32;

        {
            let mut inner = self.inner.lock();
            inner.pgid = Some(pid);
            inner.adopted = false;
            inner.adopted_pid = None;
            inner.started_at_ms = now_ms();
            inner.stop_target = ServiceState::Stopped;
            self.apply(&mut inner, ServiceState::Starting, false, &format!("spawned pid {pid}"));
        }

        if let Some(this) = self.weak.upgrade() {
            tokio::spawn(async move {
                let status = child.wait().await;
                this.on_child_exit(epoch, status);
            });
        }

        Ok(())
    }

    /// Probe succeeded: Starting -> Running, healthy.
    pub fn mark_running(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ServiceState::Starting {
            self.apply(&mut inner, ServiceState::Running, true, "health probe passed");
        }
    }

    /// Retry exhaustion: land in Failed from wherever the last attempt
    /// left off, with the final error as the transition message.
    pub fn mark_failed(&self, message: &str) {
        let mut inner = self.inner.lock();
        if inner.state == ServiceState::Failed {
            return;
        }
        inner.last_error = Some(message.to_string());
        self.apply(&mut inner, ServiceState::Failed, false, message);
    }

    /// Recognise an already-running foreign process as this service.
    ///
    /// The supervisor holds no handle on it; the pid (when known) is
    /// only remembered as a best-effort stop target.
    pub fn adopt(&self, pid: Option<i32>) {
        let mut inner = self.inner.lock();
        inner.child_epoch += 1;
        inner.pgid = None;
        inner.adopted = true;
        inner.adopted_pid = pid;
        inner.started_at_ms = now_ms();
        inner.stop_target = ServiceState::Stopped;
        self.apply(
            &mut inner,
            ServiceState::Running,
            true,
            &format!("adopted existing process on port {}", self.def.grpc_port),
        );
    }

    /// Record a probe outcome. Returns the previous healthy flag when
    /// the service is Running, `None` otherwise. A flip emits an
    /// advisory event (`previous == current` chain is preserved
    /// because the wire status itself changes with the flag).
    pub fn set_health(&self, healthy: bool, message: &str) -> Option<bool> {
        let mut inner = self.inner.lock();
        if inner.state != ServiceState::Running {
            return None;
        }
        let prev = inner.healthy;
        inner.last_health_check_ms = now_ms();
        if prev != healthy {
            let prev_status = inner.state.status(prev);
            inner.healthy = healthy;
            let cur_status = inner.state.status(healthy);
            self.events.emit(ServiceEvent::new(
                self.def.short_name.clone(),
                prev_status,
                cur_status,
                message,
                now_ms(),
            ));
        }
        Some(prev)
    }

    /// Stop the service.
    ///
    /// Graceful: SIGTERM the group, wait up to `timeout`, escalate to
    /// SIGKILL (landing in Failed). Force: SIGKILL immediately, landing
    /// in Stopped, since the kill was the request itself. Stopping
    /// an already-stopped (or failed) service succeeds without a
    /// transition or event. Adopted services get a best-effort signal
    /// to the pid observed at adoption and land in Stopped.
    pub async fn stop(&self, timeout: Duration, force: bool) -> Result<(), SupervisorError> {
        enum Plan {
            Done,
            AlreadyStopping,
            Adopted(Option<i32>),
            Owned(i32),
        }

        let plan = {
            let mut inner = self.inner.lock();
            match inner.state {
                ServiceState::Stopped | ServiceState::Failed | ServiceState::Unknown => Plan::Done,
                ServiceState::Stopping => Plan::AlreadyStopping,
                _ if inner.adopted => {
                    let pid = inner.adopted_pid;
                    self.apply(&mut inner, ServiceState::Stopping, false, "stopping adopted process");
                    Plan::Adopted(pid)
                }
                _ => match inner.pgid {
                    Some(pgid) => {
                        inner.stop_target = ServiceState::Stopped;
                        self.apply(&mut inner, ServiceState::Stopping, false, "stop requested");
                        Plan::Owned(pgid)
                    }
                    None => {
                        // Active without a handle should not happen;
                        // normalise to Stopped.
                        self.apply(&mut inner, ServiceState::Stopped, false, "stopped (no process)");
                        Plan::Done
                    }
                },
            }
        };

        match plan {
            Plan::Done => Ok(()),
            Plan::AlreadyStopping => {
                let _ = self.wait_terminal(timeout + KILL_WAIT).await;
                Ok(())
            }
            Plan::Adopted(pid) => {
                if let Some(pid) = pid {
                    signal_group(pid, Signal::SIGTERM);
                }
                let mut inner = self.inner.lock();
                if inner.state == ServiceState::Stopping {
                    self.apply(&mut inner, ServiceState::Stopped, false, "stopped (adopted)");
                }
                Ok(())
            }
            Plan::Owned(pgid) => {
                if force {
                    signal_group(pgid, Signal::SIGKILL);
                } else {
                    signal_group(pgid, Signal::SIGTERM);
                    if !self.wait_terminal(timeout).await {
                        // Graceful phase expired: escalate.
                        self.inner.lock().stop_target = ServiceState::Failed;
                        signal_group(pgid, Signal::SIGKILL);
                    }
                }
                if !self.wait_terminal(KILL_WAIT).await {
                    // Even SIGKILL produced no observable exit.
                    let mut inner = self.inner.lock();
                    if inner.state == ServiceState::Stopping {
                        inner.last_error = Some("process did not exit after SIGKILL".to_string());
                        self.apply(
                            &mut inner,
                            ServiceState::Failed,
                            false,
                            "process did not exit after SIGKILL",
                        );
                    }
                }
                Ok(())
            }
        }
    }

    /// True when a terminal state was reached within `timeout`.
    async fn wait_terminal(&self, timeout: Duration) -> bool {
        let mut rx = self.state_tx.subscribe();
        tokio::time::timeout(
            timeout,
            rx.wait_for(|s| matches!(s, ServiceState::Stopped | ServiceState::Failed)),
        )
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
    }

    /// Monitor-task callback when the child exits.
    fn on_child_exit(&self, epoch: u64, result: std::io::Result<std::process::ExitStatus>) {
        let mut inner = self.inner.lock();
        if inner.child_epoch != epoch {
            // A newer spawn or adoption owns the state now.
            return;
        }
        match inner.state {
            ServiceState::Stopping => {
                let target = inner.stop_target;
                let message = if target == ServiceState::Failed {
                    "force-killed after shutdown timeout"
                } else {
                    "stopped"
                };
                if target == ServiceState::Failed {
                    inner.last_error = Some(message.to_string());
                }
                self.apply(&mut inner, target, false, message);
            }
            ServiceState::Starting | ServiceState::Running => match result {
                Ok(status) if status.success() => {
                    self.apply(&mut inner, ServiceState::Stopped, false, "exited cleanly");
                }
                Ok(status) => {
                    let message = format!("exited: {status}");
                    inner.last_error = Some(message.clone());
                    self.apply(&mut inner, ServiceState::Failed, false, &message);
                }
                Err(e) => {
                    let message = format!("wait failed: {e}");
                    inner.last_error = Some(message.clone());
                    self.apply(&mut inner, ServiceState::Failed, false, &message);
                }
            },
            _ => {}
        }
    }

    /// Perform a transition under the lock: update flags, clear the
    /// handle on terminal states, publish to watchers, emit the event.
    fn apply(&self, inner: &mut Inner, to: ServiceState, healthy: bool, message: &str) {
        let prev_status = inner.state.status(inner.healthy);
        inner.state = to;
        inner.healthy = healthy && to == ServiceState::Running;
        if matches!(to, ServiceState::Stopped | ServiceState::Failed) {
            inner.pgid = None;
            inner.adopted = false;
            inner.adopted_pid = None;
            inner.started_at_ms = 0;
        }
        let cur_status = inner.state.status(inner.healthy);
        let _ = self.state_tx.send_replace(to);
        tracing::info!(service = %self.def.short_name, %prev_status, %cur_status, message, "transition");
        self.events.emit(ServiceEvent::new(
            self.def.short_name.clone(),
            prev_status,
            cur_status,
            message,
            now_ms(),
        ));
    }

    fn open_log(&self) -> Option<(Stdio, Stdio)> {
        let path = self.log_path.as_ref()?;
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()?;
        let err = file.try_clone().ok()?;
        Some((Stdio::from(file), Stdio::from(err)))
    }
}

/// Signal a process group, falling back to the single process when the
/// group signal fails (adopted pids are not always group leaders).
fn signal_group(pgid: i32, signal: Signal) {
    let pid = Pid::from_raw(pgid);
    if killpg(pid, signal).is_err() {
        let _ = kill(pid, signal);
    }
}

fn now_ms() -> u64 {
    SystemClock.epoch_ms()
}

#[cfg(test)]
#[path = "managed_tests.rs"]
mod tests;
