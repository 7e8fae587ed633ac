// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet and per-service lifecycle commands.

use crate::client::DaemonClient;
use crate::output::{print_json, print_service_line, OutputFormat};
use anyhow::{bail, Result};
use flo_wire::{Request, Response};
use std::time::Duration;

/// Render a lifecycle outcome; an accepted-but-failed operation exits
/// non-zero with the orchestrator's message.
fn finish_lifecycle(response: Response, output: OutputFormat) -> Result<()> {
    match response {
        Response::Lifecycle { success, message } => {
            if output == OutputFormat::Json {
                return print_json(&serde_json::json!({
                    "success": success,
                    "message": message,
                }));
            }
            if success {
                println!("{message}");
                Ok(())
            } else {
                bail!("{message}");
            }
        }
        other => bail!("unexpected response: {other:?}"),
    }
}

pub async fn up(client: &DaemonClient, output: OutputFormat) -> Result<()> {
    finish_lifecycle(client.request(Request::StartAll).await?, output)
}

pub async fn down(client: &DaemonClient, force: bool, output: OutputFormat) -> Result<()> {
    finish_lifecycle(client.request(Request::StopAll { force }).await?, output)
}

pub async fn start(client: &DaemonClient, service: &str, output: OutputFormat) -> Result<()> {
    let request = Request::StartService {
        service: service.to_string(),
    };
    finish_lifecycle(client.request(request).await?, output)
}

pub async fn stop(
    client: &DaemonClient,
    service: &str,
    force: bool,
    output: OutputFormat,
) -> Result<()> {
    let request = Request::StopService {
        service: service.to_string(),
        force,
    };
    finish_lifecycle(client.request(request).await?, output)
}

pub async fn restart(client: &DaemonClient, service: &str, output: OutputFormat) -> Result<()> {
    let request = Request::RestartService {
        service: service.to_string(),
    };
    finish_lifecycle(client.request(request).await?, output)
}

pub async fn status(
    client: &DaemonClient,
    service: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    match service {
        Some(service) => {
            let response = client
                .request(Request::ServiceStatus {
                    service: service.to_string(),
                })
                .await?;
            let Response::Service { service } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&service),
                OutputFormat::Text => {
                    print_service_line(&service);
                    Ok(())
                }
            }
        }
        None => {
            let response = client.request(Request::ListServices).await?;
            let Response::Services { services } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&services),
                OutputFormat::Text => {
                    for snapshot in &services {
                        print_service_line(snapshot);
                    }
                    Ok(())
                }
            }
        }
    }
}

/// Follow lifecycle events until interrupted.
pub async fn watch(client: &DaemonClient) -> Result<()> {
    let mut stream = client.stream_status().await?;
    loop {
        let frame: Response =
            flo_wire::read_frame(&mut stream, Duration::from_secs(24 * 60 * 60)).await?;
        match frame {
            Response::Event { event } => println!("{event}"),
            other => bail!("unexpected frame: {other:?}"),
        }
    }
}
