// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System views and ad-hoc dispatch.

use crate::client::DaemonClient;
use crate::output::{print_error_entry, print_json, print_metrics, print_service_line, OutputFormat};
use anyhow::{bail, Context, Result};
use flo_wire::{DispatchRequest, Request, Response};

pub async fn overview(client: &DaemonClient, output: OutputFormat) -> Result<()> {
    let response = client.request(Request::Overview).await?;
    let Response::Overview { overview } = response else {
        bail!("unexpected response: {response:?}");
    };
    match output {
        OutputFormat::Json => print_json(&overview),
        OutputFormat::Text => {
            println!("orchestrator: {}", overview.state);
            println!("healthy:      {}", overview.healthy.join(", "));
            if !overview.degraded.is_empty() {
                println!("degraded:     {}", overview.degraded.join(", "));
            }
            if !overview.unhealthy.is_empty() {
                println!("unhealthy:    {}", overview.unhealthy.join(", "));
            }
            print_metrics(&overview.metrics);
            if !overview.recent_errors.is_empty() {
                println!("recent errors:");
                for entry in &overview.recent_errors {
                    print_error_entry(entry);
                }
            }
            Ok(())
        }
    }
}

pub async fn health(client: &DaemonClient, output: OutputFormat) -> Result<()> {
    let response = client.request(Request::Health).await?;
    let Response::Health { health } = response else {
        bail!("unexpected response: {response:?}");
    };
    match output {
        OutputFormat::Json => print_json(&health),
        OutputFormat::Text => {
            println!("orchestrator: {}", health.state);
            for snapshot in &health.services {
                print_service_line(snapshot);
            }
            Ok(())
        }
    }
}

pub async fn metrics(client: &DaemonClient, output: OutputFormat) -> Result<()> {
    let response = client.request(Request::Metrics).await?;
    let Response::Metrics { metrics } = response else {
        bail!("unexpected response: {response:?}");
    };
    match output {
        OutputFormat::Json => print_json(&metrics),
        OutputFormat::Text => {
            print_metrics(&metrics);
            Ok(())
        }
    }
}

pub async fn errors(
    client: &DaemonClient,
    limit: Option<usize>,
    output: OutputFormat,
) -> Result<()> {
    let response = client.request(Request::ListErrors { limit }).await?;
    let Response::Errors { errors } = response else {
        bail!("unexpected response: {response:?}");
    };
    match output {
        OutputFormat::Json => print_json(&errors),
        OutputFormat::Text => {
            for entry in &errors {
                print_error_entry(entry);
            }
            Ok(())
        }
    }
}

pub async fn exec(
    client: &DaemonClient,
    service: &str,
    operation: &str,
    payload: Option<&str>,
    timeout_ms: Option<u64>,
    output: OutputFormat,
) -> Result<()> {
    let payload = match payload {
        Some(raw) => serde_json::from_str(raw).context("parse --payload as JSON")?,
        None => serde_json::Value::Null,
    };
    let request = DispatchRequest {
        service_type: service.to_string(),
        operation: operation.to_string(),
        payload,
        parameters: Default::default(),
        request_id: None,
        timeout_ms,
    };

    let response = client.request(Request::Execute { request }).await?;
    let Response::Dispatch { response } = response else {
        bail!("unexpected response: {response:?}");
    };
    match output {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Text => {
            if !response.success {
                bail!(
                    "{}",
                    response.error.unwrap_or_else(|| "request refused".to_string())
                );
            }
            println!("{}", serde_json::to_string_pretty(&response.output)?);
            Ok(())
        }
    }
}
