// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn serializes_with_wire_status_discriminants() {
    let event = ServiceEvent::new(
        "llm",
        ServiceStatus::Starting,
        ServiceStatus::Healthy,
        "health probe passed",
        42,
    );
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["service"], "llm");
    assert_eq!(json["previous"], "STARTING");
    assert_eq!(json["current"], "HEALTHY");
    assert_eq!(json["timestamp_ms"], 42);
}

#[test]
fn display_includes_transition_and_message() {
    let event = ServiceEvent::new(
        "rag",
        ServiceStatus::Healthy,
        ServiceStatus::Stopping,
        "restarting: health check failures exceeded",
        0,
    );
    let s = event.to_string();
    assert!(s.contains("rag"));
    assert!(s.contains("HEALTHY -> STOPPING"));
    assert!(s.contains("restarting"));
}
