// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator: supervisor composition with policy.
//!
//! Startup walks enabled services in start order (external checks,
//! dependency waits, port arbitration, bounded retry) and then hands
//! off to a background health monitor that drives auto-restarts. The
//! managed-service map is owned here exclusively; the structural lock
//! is never held across a spawn, wait or probe.

use crate::probe::Prober;
use flo_config::FleetConfig;
use flo_core::entry::{InstanceStatus, ServiceEntry};
use flo_core::{
    Clock, ErrorKind, OrchestratorState, ServiceEvent, ServiceSnapshot, ServiceState, SystemClock,
};
use flo_registry::ServiceRegistry;
use flo_supervisor::{port, EventBus, EventEmitter, ManagedService, SupervisorError};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Orchestration failures, classified for the error taxonomy.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown service {0:?}")]
    UnknownService(String),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("external dependency {name:?} unavailable: {reason}")]
    ExternalDependencyUnavailable { name: String, reason: String },

    #[error("dependency {dependency:?} of {service:?} did not become healthy in time")]
    DependencyTimeout { service: String, dependency: String },

    #[error("port {port} conflict for {service:?}: holder could not be adopted or evicted")]
    PortConflict { service: String, port: u16 },

    #[error("service {service:?} failed to start: {last_error}")]
    StartFailed { service: String, last_error: String },

    #[error("cancelled")]
    Cancelled,
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::UnknownService(_) => ErrorKind::NotFound,
            OrchestratorError::Supervisor(SupervisorError::AlreadyActive(_)) => {
                ErrorKind::AlreadyActive
            }
            OrchestratorError::Supervisor(_) => ErrorKind::Internal,
            OrchestratorError::ExternalDependencyUnavailable { .. } => {
                ErrorKind::ExternalDependencyUnavailable
            }
            OrchestratorError::DependencyTimeout { .. } => ErrorKind::DependencyUnsatisfied,
            OrchestratorError::PortConflict { .. } => ErrorKind::PortConflict,
            OrchestratorError::StartFailed { .. } => ErrorKind::StartFailed,
            OrchestratorError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Tunable cadences; production defaults match the configuration
/// contract, tests shrink them.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Probe cadence inside a start attempt.
    pub probe_poll: Duration,
    /// Back-off between start attempts.
    pub retry_backoff: Duration,
    /// Pause between stop and start during a restart.
    pub restart_pause: Duration,
    /// Poll cadence while waiting for a dependency.
    pub dependency_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            probe_poll: Duration::from_millis(500),
            retry_backoff: Duration::from_secs(2),
            restart_pause: Duration::from_millis(500),
            dependency_poll: Duration::from_millis(250),
        }
    }
}

pub struct Orchestrator {
    config: FleetConfig,
    /// Structural lock; reads clone the Arc out.
    services: RwLock<HashMap<String, Arc<ManagedService>>>,
    /// Enabled short names in ascending start order.
    order: Vec<String>,
    state: Mutex<OrchestratorState>,
    bus: EventBus,
    emitter: EventEmitter,
    prober: Prober,
    registry: Arc<ServiceRegistry>,
    /// Cancelled by stop_all; replaced by start_all. Terminates the
    /// health monitor, never client requests.
    stop_signal: Mutex<CancellationToken>,
    /// Services with an auto-restart in flight.
    restarting: Mutex<HashSet<String>>,
    timing: Timing,
    /// Self-handle for background tasks (health monitor, restarts).
    weak: std::sync::Weak<Self>,
}

impl Orchestrator {
    pub fn new(config: FleetConfig, registry: Arc<ServiceRegistry>) -> Arc<Self> {
        Self::with_timing(config, registry, Timing::default())
    }

    /// Must be called from within a tokio runtime (the event bus
    /// spawns its fan-out task).
    pub fn with_timing(
        config: FleetConfig,
        registry: Arc<ServiceRegistry>,
        timing: Timing,
    ) -> Arc<Self> {
        let bus = EventBus::new();
        let emitter = bus.emitter();
        let log_dir = config.orchestrator.log_dir.clone();

        let mut services = HashMap::new();
        for def in &config.services {
            services.insert(
                def.short_name.clone(),
                ManagedService::new(
                    def.clone(),
                    &config.orchestrator.binary_path,
                    log_dir.as_deref(),
                    emitter.clone(),
                ),
            );
        }
        let order = config
            .enabled_in_start_order()
            .iter()
            .map(|d| d.short_name.clone())
            .collect();

        Arc::new_cyclic(|weak| Self {
            config,
            services: RwLock::new(services),
            order,
            state: Mutex::new(OrchestratorState::Stopped),
            bus,
            emitter,
            prober: Prober::new(),
            registry,
            stop_signal: Mutex::new(CancellationToken::new()),
            restarting: Mutex::new(HashSet::new()),
            timing,
            weak: weak.clone(),
        })
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Short names in declaration order, for the overview and status
    /// streaming.
    pub fn service_names(&self) -> Vec<String> {
        self.config
            .services
            .iter()
            .map(|d| d.short_name.clone())
            .collect()
    }

    pub fn service(&self, name: &str) -> Result<Arc<ManagedService>, OrchestratorError> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownService(name.to_string()))
    }

    pub fn snapshot(&self, name: &str) -> Result<ServiceSnapshot, OrchestratorError> {
        Ok(self.service(name)?.snapshot())
    }

    /// Snapshots in declaration order.
    pub fn snapshots(&self) -> Vec<ServiceSnapshot> {
        let services = self.services.read();
        self.config
            .services
            .iter()
            .filter_map(|d| services.get(&d.short_name))
            .map(|s| s.snapshot())
            .collect()
    }

    /// Stamp a service's last-error fields (dispatch failures).
    pub fn set_service_error(&self, name: &str, message: &str) {
        if let Ok(svc) = self.service(name) {
            svc.set_last_error(message);
        }
    }

    /// Startup protocol: external checks, then each enabled service in
    /// start order with dependency waits, port arbitration and bounded
    /// retry. On success the health monitor is running.
    pub async fn start_all(&self, cancel: &CancellationToken) -> Result<(), OrchestratorError> {
        *self.state.lock() = OrchestratorState::Starting;
        let stop = {
            let mut signal = self.stop_signal.lock();
            *signal = CancellationToken::new();
            signal.clone()
        };

        for (key, dep) in &self.config.dependencies {
            if !dep.required {
                continue;
            }
            self.prober.check_external(key, dep).await.map_err(|reason| {
                OrchestratorError::ExternalDependencyUnavailable {
                    name: dep.name.clone(),
                    reason,
                }
            })?;
        }

        for name in &self.order {
            if cancel.is_cancelled() || stop.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }
            let svc = self.service(name)?;
            self.wait_for_dependencies(&svc, cancel, &stop).await?;
            self.start_one(&svc, cancel, &stop).await?;
        }

        *self.state.lock() = OrchestratorState::Running;
        self.spawn_health_monitor();
        tracing::info!(services = self.order.len(), "fleet running");
        Ok(())
    }

    /// Shutdown protocol: trip the stop signal (ending the monitor),
    /// then stop in reverse start order.
    pub async fn stop_all(&self, force: bool) {
        *self.state.lock() = OrchestratorState::Stopping;
        self.stop_signal.lock().cancel();

        for name in self.order.iter().rev() {
            if let Ok(svc) = self.service(name) {
                if let Err(e) = svc
                    .stop(self.config.orchestrator.shutdown_timeout, force)
                    .await
                {
                    tracing::warn!(service = name.as_str(), error = %e, "stop failed");
                }
                self.sync_registry(&svc);
            }
        }

        *self.state.lock() = OrchestratorState::Stopped;
        tracing::info!("fleet stopped");
    }

    /// Start one service (arbitration + bounded retry, no dependency
    /// wait; single starts are operator actions).
    pub async fn start_service(&self, name: &str) -> Result<(), OrchestratorError> {
        let svc = self.service(name)?;
        let stop = self.stop_signal.lock().clone();
        self.start_one(&svc, &CancellationToken::new(), &stop).await
    }

    pub async fn stop_service(&self, name: &str, force: bool) -> Result<(), OrchestratorError> {
        let svc = self.service(name)?;
        svc.stop(self.config.orchestrator.shutdown_timeout, force)
            .await?;
        self.sync_registry(&svc);
        Ok(())
    }

    pub async fn restart_service(&self, name: &str) -> Result<(), OrchestratorError> {
        let svc = self.service(name)?;
        self.restart_inner(&svc).await
    }

    async fn restart_inner(
        &self,
        svc: &Arc<ManagedService>,
    ) -> Result<(), OrchestratorError> {
        let _ = svc
            .stop(self.config.orchestrator.shutdown_timeout, false)
            .await;
        self.sync_registry(svc);
        tokio::time::sleep(self.timing.restart_pause).await;
        svc.increment_restart_count();
        let stop = self.stop_signal.lock().clone();
        self.start_with_retry(svc, &CancellationToken::new(), &stop)
            .await
    }

    async fn wait_for_dependencies(
        &self,
        svc: &Arc<ManagedService>,
        cancel: &CancellationToken,
        stop: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let deps = svc.def().dependencies.clone();
        if deps.is_empty() {
            return Ok(());
        }
        let deadline = tokio::time::Instant::now() + self.config.orchestrator.startup_timeout;
        for dep in deps {
            let dep_svc = self.service(&dep)?;
            loop {
                if cancel.is_cancelled() || stop.is_cancelled() {
                    return Err(OrchestratorError::Cancelled);
                }
                let snap = dep_svc.snapshot();
                if snap.state == ServiceState::Running && snap.healthy {
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(OrchestratorError::DependencyTimeout {
                        service: svc.name().to_string(),
                        dependency: dep,
                    });
                }
                tokio::time::sleep(self.timing.dependency_poll).await;
            }
        }
        Ok(())
    }

    /// Port arbitration, then bounded retry.
    async fn start_one(
        &self,
        svc: &Arc<ManagedService>,
        cancel: &CancellationToken,
        stop: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        if svc.state().is_active() || svc.state() == ServiceState::Stopping {
            return Err(SupervisorError::AlreadyActive(svc.name().to_string()).into());
        }
        let def = svc.def().clone();

        if port::is_port_open(def.grpc_port).await {
            // Someone already answers on the primary port. Adopt it if
            // it passes this service's own health probe.
            if self.prober.probe_service(&def).await {
                let pid = port::find_listener_pid(def.grpc_port).await;
                svc.adopt(pid);
                self.sync_registry(svc);
                tracing::info!(service = %def.short_name, port = def.grpc_port, ?pid, "adopted");
                return Ok(());
            }
            tracing::warn!(
                service = %def.short_name,
                port = def.grpc_port,
                "port held by an unhealthy process, evicting"
            );
            port::evict_listener(def.grpc_port).await.map_err(|_| {
                OrchestratorError::PortConflict {
                    service: def.short_name.clone(),
                    port: def.grpc_port,
                }
            })?;
        }

        self.start_with_retry(svc, cancel, stop).await
    }

    async fn start_with_retry(
        &self,
        svc: &Arc<ManagedService>,
        cancel: &CancellationToken,
        stop: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let def = svc.def().clone();
        let max_attempts = def.max_retries.max(1);
        let mut last_error = String::from("never attempted");

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() || stop.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            match svc.start() {
                Err(e @ SupervisorError::AlreadyActive(_)) => return Err(e.into()),
                Err(e) => {
                    last_error = e.to_string();
                }
                Ok(()) => {
                    let deadline =
                        tokio::time::Instant::now() + self.config.orchestrator.startup_timeout;
                    let attempt_error = loop {
                        if cancel.is_cancelled() || stop.is_cancelled() {
                            return Err(OrchestratorError::Cancelled);
                        }
                        if self.prober.probe_service(&def).await {
                            svc.mark_running();
                            self.sync_registry(svc);
                            return Ok(());
                        }
                        match svc.state() {
                            ServiceState::Failed | ServiceState::Stopped => {
                                break svc
                                    .snapshot()
                                    .last_error
                                    .unwrap_or_else(|| "exited during startup".to_string());
                            }
                            _ => {}
                        }
                        if tokio::time::Instant::now() >= deadline {
                            break format!(
                                "health probe did not pass within {:?}",
                                self.config.orchestrator.startup_timeout
                            );
                        }
                        tokio::time::sleep(self.timing.probe_poll).await;
                    };
                    last_error = attempt_error;
                    let _ = svc
                        .stop(self.config.orchestrator.shutdown_timeout, false)
                        .await;
                }
            }

            svc.set_last_error(&last_error);
            svc.increment_restart_count();
            tracing::info!(
                service = %def.short_name,
                attempt,
                max_attempts,
                error = %last_error,
                "start attempt failed"
            );
            if attempt < max_attempts {
                tokio::time::sleep(self.timing.retry_backoff).await;
            }
        }

        svc.mark_failed(&last_error);
        self.sync_registry(svc);
        Err(OrchestratorError::StartFailed {
            service: def.short_name.clone(),
            last_error,
        })
    }

    fn spawn_health_monitor(&self) {
        let stop = self.stop_signal.lock().clone();
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(this.config.orchestrator.health_check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; services were probed
            // during startup, so skip it.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {}
                }
                this.run_health_pass(&stop).await;
            }
            tracing::debug!("health monitor stopped");
        });
    }

    async fn run_health_pass(&self, stop: &CancellationToken) {
        let services: Vec<Arc<ManagedService>> =
            self.services.read().values().cloned().collect();

        for svc in services {
            if stop.is_cancelled() {
                return;
            }
            if svc.state() != ServiceState::Running {
                // Crashed or stopped since the last pass: keep the
                // registry free of dead instances.
                self.sync_registry(&svc);
                continue;
            }
            let healthy = self.prober.probe_service(svc.def()).await;
            let message = if healthy {
                "health check passed"
            } else {
                "health check failed"
            };
            match svc.set_health(healthy, message) {
                Some(true) if !healthy => {
                    self.sync_registry(&svc);
                    if svc.restart_count() < svc.def().max_retries {
                        self.schedule_restart(&svc);
                    } else {
                        tracing::warn!(
                            service = %svc.name(),
                            "unhealthy with retry budget exhausted"
                        );
                    }
                }
                Some(false) if healthy => self.sync_registry(&svc),
                _ => {}
            }
        }
    }

    fn schedule_restart(&self, svc: &Arc<ManagedService>) {
        {
            let mut restarting = self.restarting.lock();
            if !restarting.insert(svc.name().to_string()) {
                return;
            }
        }
        let snap = svc.snapshot();
        self.emitter.emit(ServiceEvent::new(
            svc.name().to_string(),
            snap.status,
            snap.status,
            "restarting: health check failed",
            SystemClock.epoch_ms(),
        ));

        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let svc = Arc::clone(svc);
        tokio::spawn(async move {
            tracing::info!(service = %svc.name(), "automatic restart");
            if let Err(e) = this.restart_inner(&svc).await {
                tracing::warn!(service = %svc.name(), error = %e, "automatic restart failed");
            }
            this.restarting.lock().remove(svc.name());
        });
    }

    /// Mirror a service's state into the discovery registry under the
    /// deterministic id `svc-<short_name>` (register is an upsert).
    fn sync_registry(&self, svc: &Arc<ManagedService>) {
        let def = svc.def();
        let snap = svc.snapshot();
        let id = format!("svc-{}", def.short_name);
        if snap.state == ServiceState::Running {
            let mut entry = ServiceEntry::new(def.short_name.clone(), "127.0.0.1", def.grpc_port);
            entry.id = id;
            entry.version = def.version.clone();
            entry.status = if snap.healthy {
                InstanceStatus::Healthy
            } else {
                InstanceStatus::Unhealthy
            };
            if let Some(http_port) = def.http_port {
                entry
                    .metadata
                    .insert("http_port".to_string(), http_port.to_string());
            }
            self.registry.register(entry);
        } else {
            self.registry.deregister(&id);
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
