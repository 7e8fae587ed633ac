// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! flo - Flotilla CLI
//!
//! Thin client over the daemon's Unix-socket protocol.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod daemon_process;
mod env;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::OutputFormat;

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "flo",
    version,
    about = "Flotilla - a control plane for your local AI service fleet"
)]
struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the whole fleet in dependency order
    Up,

    /// Stop the whole fleet in reverse order
    Down {
        /// Skip the graceful phase
        #[arg(long)]
        force: bool,
    },

    /// Start one managed service
    Start { service: String },

    /// Stop one managed service
    Stop {
        service: String,
        /// Skip the graceful phase
        #[arg(long)]
        force: bool,
    },

    /// Restart one managed service
    Restart { service: String },

    /// Show one service, or the whole fleet
    Status { service: Option<String> },

    /// Follow lifecycle events as they happen
    Watch,

    /// Fleet overview: buckets, rates, recent errors
    Overview,

    /// Orchestrator state plus every service snapshot
    Health,

    /// Request counters
    Metrics,

    /// Recent request errors
    Errors {
        /// Only the most recent N
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Send one request to a downstream service
    Exec {
        service: String,
        operation: String,
        /// JSON payload (defaults to null)
        #[arg(long)]
        payload: Option<String>,
        /// Deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Discovery registry operations
    #[command(subcommand)]
    Registry(commands::registry::RegistryCommand),

    /// Pipeline definitions and executions
    #[command(subcommand)]
    Pipeline(commands::pipeline::PipelineCommand),

    /// Daemon lifecycle
    #[command(subcommand)]
    Daemon(commands::daemon::DaemonCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new()?;

    match cli.command {
        Commands::Up => commands::service::up(&client, cli.output).await,
        Commands::Down { force } => commands::service::down(&client, force, cli.output).await,
        Commands::Start { service } => {
            commands::service::start(&client, &service, cli.output).await
        }
        Commands::Stop { service, force } => {
            commands::service::stop(&client, &service, force, cli.output).await
        }
        Commands::Restart { service } => {
            commands::service::restart(&client, &service, cli.output).await
        }
        Commands::Status { service } => {
            commands::service::status(&client, service.as_deref(), cli.output).await
        }
        Commands::Watch => commands::service::watch(&client).await,
        Commands::Overview => commands::system::overview(&client, cli.output).await,
        Commands::Health => commands::system::health(&client, cli.output).await,
        Commands::Metrics => commands::system::metrics(&client, cli.output).await,
        Commands::Errors { limit } => commands::system::errors(&client, limit, cli.output).await,
        Commands::Exec {
            service,
            operation,
            payload,
            timeout_ms,
        } => {
            commands::system::exec(
                &client,
                &service,
                &operation,
                payload.as_deref(),
                timeout_ms,
                cli.output,
            )
            .await
        }
        Commands::Registry(command) => commands::registry::run(&client, command, cli.output).await,
        Commands::Pipeline(command) => commands::pipeline::run(&client, command, cli.output).await,
        Commands::Daemon(command) => commands::daemon::run(&client, command, cli.output).await,
    }
}
