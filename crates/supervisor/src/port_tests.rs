// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::net::TcpListener;

#[tokio::test]
async fn detects_open_and_closed_ports() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    assert!(is_port_open(port).await);

    drop(listener);
    // The OS releases the port promptly once the listener is gone.
    assert!(wait_port_free(port, Duration::from_secs(2)).await);
    assert!(!is_port_open(port).await);
}

#[tokio::test]
async fn wait_port_free_times_out_while_held() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    assert!(!wait_port_free(port, Duration::from_millis(400)).await);
    drop(listener);
}

#[tokio::test]
async fn find_listener_pid_is_best_effort() {
    // Whatever the environment (lsof present or not), this must not
    // hang or panic; on a port nobody holds it returns None.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    assert_eq!(find_listener_pid(port).await, None);
}
