// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status streaming: a connection-upgrading request.
//!
//! After `StreamStatus` the connection carries `Response::Event`
//! frames only: first one synthetic event per known service with
//! previous status Unknown, then live transitions from the event bus
//! until the client disconnects. The subscription is removed exactly
//! once, on the way out.

use super::{ConnectionError, ListenCtx};
use crate::env::ipc_timeout;
use flo_core::{Clock, ServiceEvent, ServiceStatus, SystemClock};
use flo_wire::Response;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub(super) async fn handle_stream<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + AsyncReadExt + Unpin + Send + 'static,
    W: AsyncWrite + AsyncWriteExt + Unpin + Send + 'static,
{
    let bus = ctx.orchestrator.bus();
    let (id, mut rx) = bus.subscribe();

    // Synthetic snapshot so a fresh subscriber knows the whole fleet.
    let now = SystemClock.epoch_ms();
    for snapshot in ctx.orchestrator.snapshots() {
        let event = ServiceEvent::new(
            snapshot.name.clone(),
            ServiceStatus::Unknown,
            snapshot.status,
            "",
            now,
        );
        if flo_wire::write_frame(&mut writer, &Response::Event { event }, ipc_timeout())
            .await
            .is_err()
        {
            bus.unsubscribe(id);
            return Ok(());
        }
    }

    loop {
        tokio::select! {
            // The client never sends again on this connection; a read
            // completing means EOF or junk; either way, it is gone.
            _ = read_one(&mut reader) => break,
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let frame = Response::Event { event };
                        if flo_wire::write_frame(&mut writer, &frame, ipc_timeout()).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    debug!("status stream closed");
    bus.unsubscribe(id);
    Ok(())
}

async fn read_one<R: AsyncReadExt + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}
