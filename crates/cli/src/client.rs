// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket client: one length-prefixed request, one response.

use anyhow::{bail, Context, Result};
use flo_wire::{Request, Response};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;

const IPC_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket_path: crate::env::socket_path()?,
        })
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Send one request, starting the daemon on demand when the socket
    /// is not there yet.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            Err(_) => {
                crate::daemon_process::ensure_running(&self.socket_path).await?;
                UnixStream::connect(&self.socket_path)
                    .await
                    .with_context(|| {
                        format!("daemon socket at {}", self.socket_path.display())
                    })?
            }
        };
        self.exchange(stream, request).await
    }

    /// Send one request without auto-starting the daemon (daemon
    /// status/stop must not boot one just to ask).
    pub async fn request_if_running(&self, request: Request) -> Result<Option<Response>> {
        match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => Ok(Some(self.exchange(stream, request).await?)),
            Err(_) => Ok(None),
        }
    }

    async fn exchange(&self, mut stream: UnixStream, request: Request) -> Result<Response> {
        flo_wire::write_frame(&mut stream, &request, IPC_TIMEOUT)
            .await
            .context("send request")?;
        let response: Response = flo_wire::read_frame(&mut stream, IPC_TIMEOUT)
            .await
            .context("read response")?;
        match response {
            Response::Error { kind, message } => bail!("{message} ({kind})"),
            other => Ok(other),
        }
    }

    /// Open a status stream and hand back the connected socket; the
    /// caller reads `Response::Event` frames until it hangs up.
    pub async fn stream_status(&self) -> Result<UnixStream> {
        let mut stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            Err(_) => {
                crate::daemon_process::ensure_running(&self.socket_path).await?;
                UnixStream::connect(&self.socket_path).await?
            }
        };
        flo_wire::write_frame(&mut stream, &Request::StreamStatus, IPC_TIMEOUT).await?;
        Ok(stream)
    }
}
