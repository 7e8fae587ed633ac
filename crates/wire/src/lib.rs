// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane wire protocol.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//! Shared by the daemon listener, the CLI client, the dispatch path
//! and the rpc health probe (workers speak the same framing).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod request;
mod response;
mod types;
mod worker;

pub use frame::{
    decode, encode, read_frame, read_message, write_frame, write_message, ProtocolError,
    DEFAULT_IPC_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
pub use request::Request;
pub use response::Response;
pub use types::{DaemonStatus, DispatchRequest, DispatchResponse, HealthSummary, SystemOverview};
pub use worker::{WorkerRequest, WorkerResponse, SERVING};

/// Default dispatch deadline when a request does not carry one.
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 30_000;
