// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flotilla Daemon (flod)
//!
//! Background process that owns the fleet: supervises the managed
//! services, serves discovery and dispatch, executes pipelines.
//!
//! Architecture:
//! - Listener task: spawned task handling socket I/O
//! - Orchestrator: owns the managed-service map and the event bus
//! - Main task: waits for shutdown (signal or request) and tears down

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use flo_config::FleetConfig;
use flo_daemon::{env, lifecycle, listener};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

use lifecycle::{Config, LifecycleError, StartupResult};
use listener::{ListenCtx, Listener};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    let mut config_arg: Option<PathBuf> = None;
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("flod {}", env::PROTOCOL_VERSION);
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("flod {}", env::PROTOCOL_VERSION);
                println!("Flotilla Daemon - supervises the local AI service fleet");
                println!();
                println!("USAGE:");
                println!("    flod [CONFIG]");
                println!();
                println!("The daemon is typically started by the `flo` CLI and should not");
                println!("be invoked directly. It listens on a Unix socket for commands");
                println!("from `flo`. CONFIG defaults to $FLO_CONFIG, then ./flotilla.toml.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            other if other.starts_with('-') => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: flod [CONFIG]");
                std::process::exit(1);
            }
            path => config_arg = Some(PathBuf::from(path)),
        }
    }

    let config = Config::load()?;

    // Fleet configuration: an explicitly named file must load; the
    // default path is allowed to be absent (empty fleet; registry and
    // pipelines still serve).
    let explicit = config_arg.is_some() || env::config_is_explicit();
    let fleet_path = config_arg.unwrap_or_else(env::config_path);
    let fleet = match FleetConfig::load(&fleet_path) {
        Ok(fleet) => fleet,
        Err(e) if !explicit && !fleet_path.exists() => {
            eprintln!("note: no fleet configuration at {}, starting empty ({e})", fleet_path.display());
            FleetConfig::default()
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!(fleet = %fleet_path.display(), services = fleet.services.len(), "starting daemon");

    let StartupResult { daemon, listener } = match lifecycle::startup(&config, fleet) {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("flod is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and
            // may not flush in time).
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let shutdown_notify = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx::from_daemon(&daemon, Arc::clone(&shutdown_notify)));
    tokio::spawn(Listener::new(listener, ctx).run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Daemon ready, listening on {}", config.socket_path.display());

    // Signal ready for the parent process (CLI waiting for startup)
    println!("READY");

    tokio::select! {
        _ = shutdown_notify.notified() => info!("Shutdown requested via command"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
    }

    daemon.shutdown().await?;
    info!("Daemon stopped");
    Ok(())
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files kept around (flod.log.1 .. .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Size-based rotation, done once at startup rather than on a timer.
/// Best-effort: a failed rename must not prevent the daemon from
/// starting, so errors are dropped.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let oversized = std::fs::metadata(log_path).map(|m| m.len() >= MAX_LOG_SIZE);
    if !matches!(oversized, Ok(true)) {
        return;
    }

    let numbered =
        |n: u32| -> std::path::PathBuf { log_path.with_extension(format!("log.{n}")) };
    // Shift the chain from the oldest end: .2 -> .3, .1 -> .2, live -> .1.
    for n in (1..MAX_ROTATED_LOGS).rev() {
        let _ = std::fs::rename(numbered(n), numbered(n + 1));
    }
    let _ = std::fs::rename(log_path, numbered(1));
}

/// Append a line to the daemon log with plain blocking IO. Used before
/// tracing is installed (the startup marker) and for errors that must
/// hit the disk before the process exits (tracing's appender is
/// non-blocking and may not flush in time).
fn append_log_line(config: &Config, line: &str) -> std::io::Result<()> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?
        .write_all(format!("{line}\n").as_bytes())
}

/// Marker line the CLI greps for to find where the current startup
/// attempt begins: "--- flod: starting (pid: 12345) ---".
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    let pid = std::process::id();
    append_log_line(config, &format!("--- flod: starting (pid: {pid}) ---\n"))?;
    Ok(())
}

fn write_startup_error(config: &Config, error: &LifecycleError) {
    let _ = append_log_line(config, &format!("ERROR Failed to start daemon: {error}"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let directory = config.log_path.parent().ok_or(LifecycleError::NoStateDir)?;
    let file_name = config
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoStateDir)?;
    std::fs::create_dir_all(directory)?;

    // Rotation is handled at startup; the appender writes one file.
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer))
        .init();

    Ok(guard)
}
