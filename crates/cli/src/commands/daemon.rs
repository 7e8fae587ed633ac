// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle commands.

use crate::client::DaemonClient;
use crate::output::{print_json, OutputFormat};
use anyhow::{bail, Result};
use clap::Subcommand;
use flo_wire::{Request, Response};

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon if it is not already running
    Start,

    /// Ask a running daemon to shut down
    Stop,

    /// Daemon self-status (version, uptime, orchestrator state)
    Status,
}

pub async fn run(client: &DaemonClient, command: DaemonCommand, output: OutputFormat) -> Result<()> {
    match command {
        DaemonCommand::Start => {
            crate::daemon_process::ensure_running(client.socket_path()).await?;
            // Confirm it answers.
            let response = client.request(Request::Ping).await?;
            if response != Response::Pong {
                bail!("daemon answered unexpectedly: {response:?}");
            }
            println!("flod is running");
            Ok(())
        }

        DaemonCommand::Stop => match client.request_if_running(Request::Shutdown).await? {
            Some(Response::ShuttingDown) => {
                println!("flod is shutting down");
                Ok(())
            }
            Some(other) => bail!("unexpected response: {other:?}"),
            None => {
                println!("flod is not running");
                Ok(())
            }
        },

        DaemonCommand::Status => match client.request_if_running(Request::Status).await? {
            Some(Response::Status { status }) => match output {
                OutputFormat::Json => print_json(&status),
                OutputFormat::Text => {
                    println!("flod {}", status.version);
                    println!("uptime:   {}s", status.uptime_secs);
                    println!("state:    {}", status.state);
                    println!("running:  {} services", status.services_running);
                    println!("pipelines: {}", status.pipelines);
                    Ok(())
                }
            },
            Some(other) => bail!("unexpected response: {other:?}"),
            None => {
                println!("flod is not running");
                Ok(())
            }
        },
    }
}
