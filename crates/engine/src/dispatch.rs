// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch: resolve a healthy endpoint through the locator,
//! invoke the worker under the request deadline, record the outcome.

use crate::admin::Admin;
use async_trait::async_trait;
use flo_core::entry::ServiceEntry;
use flo_core::{id, Clock, ErrorKind, SystemClock};
use flo_registry::{LocateError, Locator};
use flo_wire::{
    DispatchRequest, DispatchResponse, WorkerRequest, WorkerResponse, DEFAULT_DISPATCH_TIMEOUT_MS,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Dispatch failures, classified for the error taxonomy.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("no healthy instance of service {0:?}")]
    NoHealthyInstance(String),

    #[error("deadline exceeded dispatching to {0:?}")]
    DeadlineExceeded(String),

    #[error("cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DispatchError::NoHealthyInstance(_) => ErrorKind::NotFound,
            DispatchError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            DispatchError::Cancelled => ErrorKind::Cancelled,
            DispatchError::Transport(_) => ErrorKind::Internal,
        }
    }
}

/// Capability to invoke one operation on one worker instance.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn invoke(
        &self,
        entry: &ServiceEntry,
        request: WorkerRequest,
        timeout: Duration,
    ) -> Result<WorkerResponse, DispatchError>;
}

/// Production dispatcher speaking the worker wire protocol over TCP.
pub struct TcpDispatcher;

#[async_trait]
impl Dispatcher for TcpDispatcher {
    async fn invoke(
        &self,
        entry: &ServiceEntry,
        request: WorkerRequest,
        timeout: Duration,
    ) -> Result<WorkerResponse, DispatchError> {
        let address = entry.address();
        let exchange = async {
            let mut stream = TcpStream::connect(&address)
                .await
                .map_err(|e| DispatchError::Transport(format!("connect {address}: {e}")))?;
            let payload = flo_wire::encode(&request)
                .map_err(|e| DispatchError::Transport(e.to_string()))?;
            flo_wire::write_message(&mut stream, &payload)
                .await
                .map_err(|e| DispatchError::Transport(e.to_string()))?;
            let bytes = flo_wire::read_message(&mut stream)
                .await
                .map_err(|e| DispatchError::Transport(e.to_string()))?;
            flo_wire::decode(&bytes).map_err(|e| DispatchError::Transport(e.to_string()))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| DispatchError::DeadlineExceeded(entry.name.clone()))?
    }
}

/// The facade's `Execute` operation: validation, endpoint resolution,
/// invocation, outcome recording.
pub struct DispatchService {
    locator: Arc<Locator>,
    dispatcher: Arc<dyn Dispatcher>,
    admin: Arc<Admin>,
    /// Stamps the managed service's last-error fields; wired to the
    /// orchestrator by the daemon.
    on_error: Option<Arc<dyn Fn(&str, &str) + Send + Sync>>,
}

impl DispatchService {
    pub fn new(locator: Arc<Locator>, dispatcher: Arc<dyn Dispatcher>, admin: Arc<Admin>) -> Self {
        Self {
            locator,
            dispatcher,
            admin,
            on_error: None,
        }
    }

    pub fn with_error_hook(mut self, hook: Arc<dyn Fn(&str, &str) + Send + Sync>) -> Self {
        self.on_error = Some(hook);
        self
    }

    /// Execute one dispatch. Cancellation aborts the in-flight call
    /// but never touches any managed child process.
    pub async fn execute(
        &self,
        request: DispatchRequest,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        if request.service_type.trim().is_empty() {
            return Err(DispatchError::InvalidArgument(
                "service_type must not be empty".to_string(),
            ));
        }
        if request.operation.trim().is_empty() {
            return Err(DispatchError::InvalidArgument(
                "operation must not be empty".to_string(),
            ));
        }

        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| id::generate(id::REQUEST_PREFIX));
        let timeout =
            Duration::from_millis(request.timeout_ms.unwrap_or(DEFAULT_DISPATCH_TIMEOUT_MS));

        let entry = self.locator.locate(&request.service_type).map_err(
            |LocateError::NoHealthyInstance(name)| DispatchError::NoHealthyInstance(name),
        )?;

        let worker_request = WorkerRequest::Execute {
            operation: request.operation.clone(),
            payload: request.payload.clone(),
            parameters: request.parameters.clone(),
            request_id: request_id.clone(),
        };

        let started = SystemClock.now();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = self.dispatcher.invoke(&entry, worker_request, timeout) => result,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(WorkerResponse::Result {
                success,
                output,
                error,
            }) => {
                self.admin.record_request(
                    &request.service_type,
                    &request.operation,
                    success,
                    latency_ms,
                    &request_id,
                );
                if !success {
                    let message = error.clone().unwrap_or_else(|| "worker refused".to_string());
                    self.record_failure(&request, ErrorKind::Internal, &message, &request_id);
                }
                Ok(DispatchResponse {
                    success,
                    output,
                    error,
                    request_id,
                    latency_ms,
                })
            }
            Ok(other) => {
                let message = format!("unexpected worker reply: {other:?}");
                self.admin.record_request(
                    &request.service_type,
                    &request.operation,
                    false,
                    latency_ms,
                    &request_id,
                );
                self.record_failure(&request, ErrorKind::Internal, &message, &request_id);
                Err(DispatchError::Transport(message))
            }
            Err(e) => {
                self.admin.record_request(
                    &request.service_type,
                    &request.operation,
                    false,
                    latency_ms,
                    &request_id,
                );
                self.record_failure(&request, e.kind(), &e.to_string(), &request_id);
                Err(e)
            }
        }
    }

    fn record_failure(
        &self,
        request: &DispatchRequest,
        kind: ErrorKind,
        message: &str,
        request_id: &str,
    ) {
        self.admin.record_error(
            &request.service_type,
            &request.operation,
            kind,
            message,
            request_id,
        );
        if let Some(hook) = &self.on_error {
            hook(&request.service_type, message);
        }
    }
}

/// In-memory dispatcher for tests: canned replies per operation, an
/// echo fallback, and a call log.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeDispatcher {
    replies: parking_lot::Mutex<std::collections::HashMap<String, Result<WorkerResponse, String>>>,
    calls: parking_lot::Mutex<Vec<(String, String, serde_json::Value)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeDispatcher {
    pub fn new() -> Self {
        Self {
            replies: parking_lot::Mutex::new(std::collections::HashMap::new()),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Canned successful output for an operation.
    pub fn respond(&self, operation: &str, output: serde_json::Value) {
        self.replies.lock().insert(
            operation.to_string(),
            Ok(WorkerResponse::Result {
                success: true,
                output,
                error: None,
            }),
        );
    }

    /// Canned success=false refusal for an operation.
    pub fn refuse(&self, operation: &str, error: &str) {
        self.replies.lock().insert(
            operation.to_string(),
            Ok(WorkerResponse::Result {
                success: false,
                output: serde_json::Value::Null,
                error: Some(error.to_string()),
            }),
        );
    }

    /// Canned transport failure for an operation.
    pub fn fail(&self, operation: &str, message: &str) {
        self.replies
            .lock()
            .insert(operation.to_string(), Err(message.to_string()));
    }

    /// `(service name, operation, payload)` per invocation, in order.
    pub fn calls(&self) -> Vec<(String, String, serde_json::Value)> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Dispatcher for FakeDispatcher {
    async fn invoke(
        &self,
        entry: &ServiceEntry,
        request: WorkerRequest,
        _timeout: Duration,
    ) -> Result<WorkerResponse, DispatchError> {
        let WorkerRequest::Execute {
            operation, payload, ..
        } = request
        else {
            return Ok(WorkerResponse::serving());
        };
        self.calls
            .lock()
            .push((entry.name.clone(), operation.clone(), payload.clone()));

        match self.replies.lock().get(&operation) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(DispatchError::Transport(message.clone())),
            None => Ok(WorkerResponse::Result {
                success: true,
                output: payload,
                error: None,
            }),
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
