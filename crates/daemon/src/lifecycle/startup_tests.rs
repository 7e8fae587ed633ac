// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[tokio::test]
async fn startup_creates_runtime_files() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().join("state"));

    let result = startup(&config, FleetConfig::default()).unwrap();

    assert!(config.socket_path.exists());
    assert!(config.lock_path.exists());
    let pid: u32 = std::fs::read_to_string(&config.lock_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid, std::process::id());
    assert_eq!(
        std::fs::read_to_string(&config.version_path).unwrap(),
        crate::env::PROTOCOL_VERSION
    );

    drop(result);
}

#[tokio::test]
async fn second_startup_fails_on_lock() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().to_path_buf());

    let _first = startup(&config, FleetConfig::default()).unwrap();
    let second = startup(&config, FleetConfig::default());
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
}

#[tokio::test]
async fn shutdown_removes_runtime_files() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().to_path_buf());

    let StartupResult { daemon, listener } = startup(&config, FleetConfig::default()).unwrap();
    drop(listener);
    daemon.shutdown().await.unwrap();

    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}

#[tokio::test]
async fn stale_socket_is_replaced() {
    let dir = tempdir().unwrap();
    let config = Config::in_dir(dir.path().to_path_buf());
    std::fs::create_dir_all(&config.state_dir).unwrap();
    std::fs::write(&config.socket_path, b"stale").unwrap();

    let result = startup(&config, FleetConfig::default()).unwrap();
    drop(result);
}
