// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{Request, Response};
use flo_core::ErrorKind;

#[tokio::test]
async fn round_trips_a_request_frame() {
    let request = Request::StartService {
        service: "llm".to_string(),
    };
    let mut buf = Vec::new();
    write_frame(&mut buf, &request, DEFAULT_IPC_TIMEOUT)
        .await
        .unwrap();

    let mut reader = buf.as_slice();
    let back: Request = read_frame(&mut reader, DEFAULT_IPC_TIMEOUT).await.unwrap();
    assert_eq!(back, request);
}

#[tokio::test]
async fn round_trips_a_response_frame() {
    let response = Response::Error {
        kind: ErrorKind::NotFound,
        message: "no such pipeline".to_string(),
    };
    let mut buf = Vec::new();
    write_frame(&mut buf, &response, DEFAULT_IPC_TIMEOUT)
        .await
        .unwrap();

    let mut reader = buf.as_slice();
    let back: Response = read_frame(&mut reader, DEFAULT_IPC_TIMEOUT).await.unwrap();
    assert_eq!(back, response);
}

#[tokio::test]
async fn length_prefix_is_big_endian() {
    let mut buf = Vec::new();
    write_message(&mut buf, b"hello").await.unwrap();
    assert_eq!(&buf[..4], &[0, 0, 0, 5]);
    assert_eq!(&buf[4..], b"hello");
}

#[tokio::test]
async fn eof_maps_to_connection_closed() {
    let mut reader: &[u8] = &[];
    let err = read_message(&mut reader).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn truncated_payload_maps_to_connection_closed() {
    // Prefix claims 10 bytes; only 3 follow.
    let mut data = vec![0u8, 0, 0, 10];
    data.extend_from_slice(b"abc");
    let mut reader = data.as_slice();
    let err = read_message(&mut reader).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected_before_alloc() {
    let mut data = (u32::MAX).to_be_bytes().to_vec();
    data.extend_from_slice(b"junk");
    let mut reader = data.as_slice();
    let err = read_message(&mut reader).await.unwrap_err();
    assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
}
