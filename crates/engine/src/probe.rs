// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health probes and external-dependency reachability checks.
//!
//! A probe failure is silent: it returns false and is logged at debug.
//! Only repeated failures drive state changes, and that policy lives
//! in the orchestrator's health monitor.

use flo_config::{ExternalDependency, ProbeKind, ServiceDef};
use flo_wire::{WorkerRequest, WorkerResponse, SERVING};
use std::time::Duration;
use tokio::net::TcpStream;

/// Hard ceiling per probe regardless of configuration.
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Budget for one external-dependency HTTP check.
pub const EXTERNAL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe runner; owns the HTTP client used for http probes and
/// external checks.
#[derive(Clone)]
pub struct Prober {
    http: reqwest::Client,
}

impl Prober {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Run a service's configured probe against localhost.
    pub async fn probe_service(&self, def: &ServiceDef) -> bool {
        let timeout = def.health_check.timeout.min(MAX_PROBE_TIMEOUT);
        match def.health_check.kind {
            ProbeKind::Tcp => probe_tcp(def.grpc_port, timeout).await,
            ProbeKind::Rpc => probe_rpc(def.grpc_port, timeout).await,
            ProbeKind::Http => {
                let port = def.http_port.unwrap_or(def.grpc_port);
                self.probe_http(port, &def.health_check.endpoint, timeout).await
            }
        }
    }

    /// GET the endpoint and accept any status in [200, 400).
    async fn probe_http(&self, port: u16, endpoint: &str, timeout: Duration) -> bool {
        let url = format!("http://127.0.0.1:{port}{endpoint}");
        match self.http.get(&url).timeout(timeout).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                (200..400).contains(&code)
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "http probe failed");
                false
            }
        }
    }

    /// Probe a required external dependency before startup. Unknown
    /// kinds are logged and skipped.
    pub async fn check_external(&self, key: &str, dep: &ExternalDependency) -> Result<(), String> {
        match dep.kind.as_str() {
            "http" => {
                match self
                    .http
                    .get(&dep.url)
                    .timeout(EXTERNAL_PROBE_TIMEOUT)
                    .send()
                    .await
                {
                    Ok(response) if response.status().as_u16() < 400 => Ok(()),
                    Ok(response) => Err(format!("{} returned {}", dep.url, response.status())),
                    Err(e) => Err(format!("{} unreachable: {e}", dep.url)),
                }
            }
            other => {
                tracing::warn!(key, kind = other, "unknown external dependency kind, skipping");
                Ok(())
            }
        }
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

/// A dial within the timeout is alive.
async fn probe_tcp(port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}

/// Connect and issue the standard worker health call; only a
/// "serving" reply passes.
async fn probe_rpc(port: u16, timeout: Duration) -> bool {
    let result = tokio::time::timeout(timeout, async {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.ok()?;
        let payload = flo_wire::encode(&WorkerRequest::Health).ok()?;
        flo_wire::write_message(&mut stream, &payload).await.ok()?;
        let bytes = flo_wire::read_message(&mut stream).await.ok()?;
        flo_wire::decode::<WorkerResponse>(&bytes).ok()
    })
    .await;

    matches!(
        result,
        Ok(Some(WorkerResponse::Health { ref status })) if status == SERVING
    )
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
