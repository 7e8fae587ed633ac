// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing: 4-byte big-endian length prefix + JSON payload.

use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Maximum message size (16 MB). Payloads are model outputs, not bulk
/// data; anything bigger is a protocol violation.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default IPC timeout for a single frame.
pub const DEFAULT_IPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

fn check_len(size: usize) -> Result<(), ProtocolError> {
    if size > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// An EOF mid-frame means the peer hung up, not an IO fault.
fn io_or_closed(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}

/// Encode a message to JSON bytes (without length prefix).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    check_len(json.len())?;
    Ok(json)
}

/// Decode a message from its JSON payload bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read a length-prefixed message from an async reader.
pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await.map_err(io_or_closed)?;

    let len = u32::from_be_bytes(prefix) as usize;
    check_len(len)?;

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(io_or_closed)?;
    Ok(payload)
}

/// Write a length-prefixed message to an async writer.
pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    check_len(data.len())?;
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode one frame with a timeout.
pub async fn read_frame<T, R>(reader: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: tokio::io::AsyncReadExt + Unpin,
{
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Encode and write one frame with a timeout.
pub async fn write_frame<T, W>(
    writer: &mut W,
    msg: &T,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: tokio::io::AsyncWriteExt + Unpin,
{
    let data = encode(msg)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
