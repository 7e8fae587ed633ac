// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output rendering: human-readable text by default, `-o json` for
//! machine consumption.

use clap::ValueEnum;
use flo_core::{ErrorEntry, MetricsSnapshot, ServiceSnapshot};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a value as pretty JSON (used by every command in json mode).
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line service rendering: name, status, pid, restarts, error.
pub fn print_service_line(snapshot: &ServiceSnapshot) {
    let mut line = format!("{:<12} {:<10}", snapshot.name, snapshot.status.to_string());
    if snapshot.pid != 0 {
        line.push_str(&format!(" pid={}", snapshot.pid));
    }
    if snapshot.adopted {
        line.push_str(" adopted");
    }
    if snapshot.restart_count > 0 {
        line.push_str(&format!(" restarts={}", snapshot.restart_count));
    }
    if let Some(error) = &snapshot.last_error {
        line.push_str(&format!(" last_error={error:?}"));
    }
    println!("{line}");
}

pub fn print_metrics(metrics: &MetricsSnapshot) {
    println!(
        "requests: {} total, {} ok, {} failed",
        metrics.total, metrics.succeeded, metrics.failed
    );
    println!(
        "rates: {:.2} req/s, {:.1} ms avg latency",
        metrics.requests_per_second, metrics.avg_latency_ms
    );
}

pub fn print_error_entry(entry: &ErrorEntry) {
    println!(
        "{} {} {}/{} [{}] {}",
        entry.timestamp_ms, entry.request_id, entry.service, entry.operation, entry.kind,
        entry.message
    );
}
