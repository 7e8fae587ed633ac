// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The listener runs in a spawned task, accepting connections and
//! handling each in its own task. Handlers are raced against client
//! disconnect: a vanished client cancels the in-flight request (never
//! any managed child process).

mod lifecycle;
mod pipelines;
mod registry;
mod stream;
mod system;

use std::sync::Arc;
use std::time::Instant;

use crate::env::{ipc_timeout, PROTOCOL_VERSION};
use flo_engine::{Admin, DispatchService, Orchestrator, PipelineEngine};
use flo_registry::{Locator, ServiceRegistry};
use flo_wire::{ProtocolError, Request, Response};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<ServiceRegistry>,
    pub locator: Arc<Locator>,
    pub admin: Arc<Admin>,
    pub dispatch: Arc<DispatchService>,
    pub pipelines: Arc<PipelineEngine>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

impl ListenCtx {
    pub fn from_daemon(daemon: &crate::lifecycle::DaemonState, shutdown: Arc<Notify>) -> Self {
        Self {
            orchestrator: Arc::clone(&daemon.orchestrator),
            registry: Arc::clone(&daemon.registry),
            locator: Arc::clone(&daemon.locator),
            admin: Arc::clone(&daemon.admin),
            dispatch: Arc::clone(&daemon.dispatch),
            pipelines: Arc::clone(&daemon.pipelines),
            start_time: daemon.start_time,
            shutdown,
        }
    }
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the accept loop forever, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("Unix accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected")
        }
        ConnectionError::Protocol(ProtocolError::Timeout) => warn!("Connection timeout"),
        _ => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// Creates a `CancellationToken` and races the request handler against
/// client disconnect detection, so an abandoned request stops doing
/// work. Generic over reader/writer so tests can drive it with
/// in-memory duplex streams.
pub async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + AsyncReadExt + Unpin + Send + 'static,
    W: AsyncWrite + AsyncWriteExt + Unpin + Send + 'static,
{
    let request: Request = flo_wire::read_frame(&mut reader, ipc_timeout()).await?;

    // Queries are frequent polling; keep them at debug.
    match request {
        Request::Ping | Request::Status | Request::ListServices => {
            debug!(request = ?request, "received query")
        }
        _ => info!(request = ?request, "received request"),
    }

    // StreamStatus upgrades the connection: the daemon writes event
    // frames until the client goes away.
    if matches!(request, Request::StreamStatus) {
        return stream::handle_stream(reader, writer, ctx).await;
    }

    let token = CancellationToken::new();
    let response = tokio::select! {
        response = handle_request(request, ctx, token.clone()) => response,
        _ = detect_client_disconnect(&mut reader) => {
            token.cancel();
            debug!("Client disconnected, cancelling handler");
            return Ok(());
        }
    };

    debug!("Sending response: {:?}", response);
    flo_wire::write_frame(&mut writer, &response, ipc_timeout()).await?;
    Ok(())
}

/// Detect client disconnect by reading from the socket after the
/// request. In this request-response protocol the client sends one
/// request then waits; a read of 0 bytes means it hung up.
async fn detect_client_disconnect<R: AsyncReadExt + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

/// Handle a single request and return a response.
pub async fn handle_request(request: Request, ctx: &ListenCtx, cancel: CancellationToken) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                debug!(client = %version, daemon = PROTOCOL_VERSION, "version skew");
            }
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::Status => system::handle_status(ctx),

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        // -- service lifecycle --
        Request::StartAll => lifecycle::handle_start_all(ctx, &cancel).await,
        Request::StopAll { force } => lifecycle::handle_stop_all(ctx, force).await,
        Request::StartService { service } => lifecycle::handle_start(ctx, &service).await,
        Request::StopService { service, force } => {
            lifecycle::handle_stop(ctx, &service, force).await
        }
        Request::RestartService { service } => lifecycle::handle_restart(ctx, &service).await,
        Request::ServiceStatus { service } => lifecycle::handle_service_status(ctx, &service),
        Request::ListServices => Response::Services {
            services: ctx.orchestrator.snapshots(),
        },

        // -- discovery registry --
        Request::Register { entry } => registry::handle_register(ctx, entry),
        Request::Deregister { id } => registry::handle_deregister(ctx, &id),
        Request::Heartbeat { id } => registry::handle_heartbeat(ctx, &id),
        Request::Discover { name } => registry::handle_discover(ctx, &name),
        Request::GetEntry { id } => registry::handle_get(ctx, &id),
        Request::ListEntries => Response::Entries {
            entries: ctx.registry.list(),
        },

        // -- system --
        Request::Overview => system::handle_overview(ctx),
        Request::Health => system::handle_health(ctx),
        Request::Metrics => Response::Metrics {
            metrics: ctx.admin.metrics(),
        },
        Request::ListErrors { limit } => Response::Errors {
            errors: ctx.admin.errors(limit),
        },

        // -- pipelines --
        Request::CreatePipeline { pipeline } => pipelines::handle_create(ctx, pipeline),
        Request::GetPipeline { id } => pipelines::handle_get(ctx, &id),
        Request::ListPipelines => Response::Pipelines {
            pipelines: ctx.pipelines.list(),
        },
        Request::DeletePipeline { id } => pipelines::handle_delete(ctx, &id),
        Request::ExecutePipeline { id, input } => {
            pipelines::handle_execute(ctx, &id, input, &cancel).await
        }
        Request::GetExecution { id } => pipelines::handle_get_execution(ctx, &id),
        Request::ListExecutions => Response::Executions {
            executions: ctx.pipelines.list_executions(),
        },

        // -- dispatch --
        Request::Execute { request } => match ctx.dispatch.execute(request, &cancel).await {
            Ok(response) => Response::Dispatch { response },
            Err(e) => Response::error(e.kind(), e.to_string()),
        },

        // Intercepted in handle_connection before reaching here.
        Request::StreamStatus => Response::error(
            flo_core::ErrorKind::Internal,
            "StreamStatus must upgrade the connection",
        ),
    }
}

#[cfg(test)]
pub(crate) fn test_ctx() -> (Arc<flo_engine::FakeDispatcher>, ListenCtx) {
    test_ctx_with(flo_config::FleetConfig::default())
}

#[cfg(test)]
pub(crate) fn test_ctx_with(
    fleet: flo_config::FleetConfig,
) -> (Arc<flo_engine::FakeDispatcher>, ListenCtx) {
    use flo_engine::{Dispatcher, FakeDispatcher};

    let registry = Arc::new(ServiceRegistry::new());
    let locator = Arc::new(Locator::new(Arc::clone(&registry)));
    let known = fleet
        .services
        .iter()
        .map(|s| s.short_name.clone())
        .collect();
    let admin = Arc::new(Admin::new(Arc::clone(&locator), known));
    let orchestrator = Orchestrator::new(fleet, Arc::clone(&registry));
    let fake = Arc::new(FakeDispatcher::new());
    let dispatch = Arc::new(DispatchService::new(
        Arc::clone(&locator),
        Arc::clone(&fake) as Arc<dyn Dispatcher>,
        Arc::clone(&admin),
    ));
    let pipelines = Arc::new(PipelineEngine::new(Arc::clone(&dispatch)));

    (
        fake,
        ListenCtx {
            orchestrator,
            registry,
            locator,
            admin,
            dispatch,
            pipelines,
            start_time: Instant::now(),
            shutdown: Arc::new(Notify::new()),
        },
    )
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
