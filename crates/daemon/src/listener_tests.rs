// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{handle_connection, handle_request, test_ctx, test_ctx_with, ListenCtx};
use flo_config::{FleetConfig, OrchestratorConfig, ProbeConfig, ServiceDef};
use flo_core::test_support::{healthy_entry, pipeline, step};
use flo_core::{ExecutionStatus, ServiceEntry, ServiceStatus, StepStatus};
use flo_wire::{DispatchRequest, Request, Response};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fleet_with_llm() -> FleetConfig {
    FleetConfig {
        orchestrator: OrchestratorConfig::default(),
        dependencies: Default::default(),
        services: vec![ServiceDef {
            name: "Language Model".to_string(),
            short_name: "llm".to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
            grpc_port: 9200,
            http_port: None,
            command: vec!["/bin/sh".to_string(), "-c".to_string(), "sleep 30".to_string()],
            dependencies: vec![],
            external_dependencies: vec![],
            start_order: 1,
            max_retries: 3,
            enabled: true,
            health_check: ProbeConfig::default(),
        }],
    }
}

async fn ask(ctx: &ListenCtx, request: Request) -> Response {
    handle_request(request, ctx, CancellationToken::new()).await
}

#[tokio::test]
async fn ping_pong() {
    let (_fake, ctx) = test_ctx();
    assert_eq!(ask(&ctx, Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn hello_returns_daemon_version() {
    let (_fake, ctx) = test_ctx();
    let response = ask(
        &ctx,
        Request::Hello {
            version: "0.0.1".to_string(),
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Hello {
            version: crate::env::PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn register_then_discover_round_trip() {
    let (_fake, ctx) = test_ctx();

    let response = ask(
        &ctx,
        Request::Register {
            entry: ServiceEntry::new("api", "127.0.0.1", 9001),
        },
    )
    .await;
    let Response::Entry { entry } = response else {
        panic!("expected Entry, got {response:?}");
    };
    assert!(entry.id.starts_with("svc-"));
    assert!(entry.registered_at_ms > 0);
    assert!(entry.last_heartbeat_ms >= entry.registered_at_ms);

    let response = ask(
        &ctx,
        Request::Discover {
            name: "api".to_string(),
        },
    )
    .await;
    let Response::Entries { entries } = response else {
        panic!("expected Entries, got {response:?}");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].port, 9001);
}

#[tokio::test]
async fn register_validation_uses_the_error_channel() {
    let (_fake, ctx) = test_ctx();
    let response = ask(
        &ctx,
        Request::Register {
            entry: ServiceEntry::new("", "127.0.0.1", 9001),
        },
    )
    .await;
    assert!(
        matches!(
            response,
            Response::Error {
                kind: flo_core::ErrorKind::InvalidArgument,
                ..
            }
        ),
        "{response:?}"
    );
}

#[tokio::test]
async fn heartbeat_unknown_id_is_not_found() {
    let (_fake, ctx) = test_ctx();
    let response = ask(
        &ctx,
        Request::Heartbeat {
            id: "svc-ghost".to_string(),
        },
    )
    .await;
    assert!(matches!(
        response,
        Response::Error {
            kind: flo_core::ErrorKind::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn deregister_is_idempotent() {
    let (_fake, ctx) = test_ctx();
    let response = ask(
        &ctx,
        Request::Deregister {
            id: "svc-ghost".to_string(),
        },
    )
    .await;
    assert_eq!(response, Response::Ok);
}

#[tokio::test]
async fn service_status_unknown_is_not_found() {
    let (_fake, ctx) = test_ctx();
    let response = ask(
        &ctx,
        Request::ServiceStatus {
            service: "ghost".to_string(),
        },
    )
    .await;
    assert!(matches!(
        response,
        Response::Error {
            kind: flo_core::ErrorKind::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn list_services_reports_configured_fleet() {
    let (_fake, ctx) = test_ctx_with(fleet_with_llm());
    let response = ask(&ctx, Request::ListServices).await;
    let Response::Services { services } = response else {
        panic!("expected Services");
    };
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "llm");
    assert_eq!(services[0].status, ServiceStatus::Stopped);
}

#[tokio::test]
async fn start_service_on_active_uses_error_channel() {
    let (_fake, ctx) = test_ctx_with(fleet_with_llm());
    ctx.orchestrator.service("llm").unwrap().adopt(None);

    let response = ask(
        &ctx,
        Request::StartService {
            service: "llm".to_string(),
        },
    )
    .await;
    assert!(
        matches!(
            response,
            Response::Error {
                kind: flo_core::ErrorKind::AlreadyActive,
                ..
            }
        ),
        "{response:?}"
    );
}

#[tokio::test]
async fn stop_service_reports_lifecycle_success() {
    let (_fake, ctx) = test_ctx_with(fleet_with_llm());
    let response = ask(
        &ctx,
        Request::StopService {
            service: "llm".to_string(),
            force: false,
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Lifecycle {
            success: true,
            message: "llm stopped".to_string()
        }
    );
}

#[tokio::test]
async fn daemon_status_reports_state_and_counts() {
    let (_fake, ctx) = test_ctx_with(fleet_with_llm());
    let response = ask(&ctx, Request::Status).await;
    let Response::Status { status } = response else {
        panic!("expected Status");
    };
    assert_eq!(status.version, crate::env::PROTOCOL_VERSION);
    assert_eq!(status.services_running, 0);
    assert_eq!(status.pipelines, 0);
}

#[tokio::test]
async fn shutdown_notifies_and_acknowledges() {
    let (_fake, ctx) = test_ctx();
    let response = ask(&ctx, Request::Shutdown).await;
    assert_eq!(response, Response::ShuttingDown);
    // The permit is stored; this returns immediately.
    tokio::time::timeout(Duration::from_secs(1), ctx.shutdown.notified())
        .await
        .unwrap();
}

#[tokio::test]
async fn pipeline_crud_and_execution() {
    let (fake, ctx) = test_ctx();
    ctx.registry.register(healthy_entry("rag", 9300));
    ctx.registry.register(healthy_entry("llm", 9200));
    fake.respond("search", json!({"docs": ["d1"]}));
    fake.respond("generate", json!({"text": "answer"}));

    let created = ask(
        &ctx,
        Request::CreatePipeline {
            pipeline: pipeline(
                "rag-chat",
                vec![
                    step("retrieve", "rag", "search", &[]),
                    step("generate", "llm", "generate", &["retrieve"]),
                ],
            ),
        },
    )
    .await;
    assert!(matches!(created, Response::Pipeline { .. }), "{created:?}");

    let response = ask(
        &ctx,
        Request::ExecutePipeline {
            id: "rag-chat".to_string(),
            input: json!("hello"),
        },
    )
    .await;
    let Response::Execution { execution } = response else {
        panic!("expected Execution");
    };
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.steps.len(), 2);
    assert!(execution.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert!(execution.steps[0].started_at_ms <= execution.steps[1].started_at_ms);
    assert_eq!(execution.output, json!({"text": "answer"}));

    // Execution is retained and fetchable.
    let fetched = ask(
        &ctx,
        Request::GetExecution {
            id: execution.id.clone(),
        },
    )
    .await;
    assert!(matches!(fetched, Response::Execution { .. }));

    let response = ask(
        &ctx,
        Request::DeletePipeline {
            id: "rag-chat".to_string(),
        },
    )
    .await;
    assert_eq!(response, Response::Ok);
    let response = ask(
        &ctx,
        Request::GetPipeline {
            id: "rag-chat".to_string(),
        },
    )
    .await;
    assert!(matches!(
        response,
        Response::Error {
            kind: flo_core::ErrorKind::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn pipeline_with_empty_id_is_invalid() {
    let (_fake, ctx) = test_ctx();
    let response = ask(
        &ctx,
        Request::CreatePipeline {
            pipeline: pipeline("", vec![]),
        },
    )
    .await;
    assert!(matches!(
        response,
        Response::Error {
            kind: flo_core::ErrorKind::InvalidArgument,
            ..
        }
    ));
}

#[tokio::test]
async fn dispatch_round_trips_through_the_fake_worker() {
    let (fake, ctx) = test_ctx();
    ctx.registry.register(healthy_entry("nlp", 9400));
    fake.respond("analyze", json!({"sentiment": "positive"}));

    let response = ask(
        &ctx,
        Request::Execute {
            request: DispatchRequest {
                service_type: "nlp".to_string(),
                operation: "analyze".to_string(),
                payload: json!({"text": "great"}),
                parameters: Default::default(),
                request_id: None,
                timeout_ms: None,
            },
        },
    )
    .await;

    let Response::Dispatch { response } = response else {
        panic!("expected Dispatch, got {response:?}");
    };
    assert!(response.success);
    assert_eq!(response.output, json!({"sentiment": "positive"}));

    // The outcome reached the metrics.
    let Response::Metrics { metrics } = ask(&ctx, Request::Metrics).await else {
        panic!("expected Metrics");
    };
    assert_eq!(metrics.total, 1);
}

#[tokio::test]
async fn dispatch_validation_uses_the_error_channel() {
    let (_fake, ctx) = test_ctx();
    let response = ask(
        &ctx,
        Request::Execute {
            request: DispatchRequest {
                service_type: String::new(),
                operation: "x".to_string(),
                payload: json!(null),
                parameters: Default::default(),
                request_id: None,
                timeout_ms: None,
            },
        },
    )
    .await;
    assert!(matches!(
        response,
        Response::Error {
            kind: flo_core::ErrorKind::InvalidArgument,
            ..
        }
    ));
}

#[tokio::test]
async fn connection_round_trip_over_duplex() {
    let (_fake, ctx) = test_ctx();
    let ctx = std::sync::Arc::new(ctx);

    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let ctx_task = std::sync::Arc::clone(&ctx);
    let server_task = tokio::spawn(async move {
        handle_connection(server_read, server_write, &ctx_task).await
    });

    let (mut client_read, mut client_write) = tokio::io::split(client);
    flo_wire::write_frame(&mut client_write, &Request::Ping, Duration::from_secs(1))
        .await
        .unwrap();
    let response: Response = flo_wire::read_frame(&mut client_read, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(response, Response::Pong);

    drop(client_write);
    drop(client_read);
    server_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn stream_status_sends_snapshot_then_live_events() {
    let (_fake, ctx) = test_ctx_with(fleet_with_llm());
    let ctx = std::sync::Arc::new(ctx);

    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let ctx_task = std::sync::Arc::clone(&ctx);
    let server_task = tokio::spawn(async move {
        handle_connection(server_read, server_write, &ctx_task).await
    });

    let (mut client_read, mut client_write) = tokio::io::split(client);
    flo_wire::write_frame(&mut client_write, &Request::StreamStatus, Duration::from_secs(1))
        .await
        .unwrap();

    // Synthetic event first: previous status is Unknown.
    let frame: Response = flo_wire::read_frame(&mut client_read, Duration::from_secs(2))
        .await
        .unwrap();
    let Response::Event { event } = frame else {
        panic!("expected Event, got {frame:?}");
    };
    assert_eq!(event.service, "llm");
    assert_eq!(event.previous, ServiceStatus::Unknown);
    assert_eq!(event.current, ServiceStatus::Stopped);

    // A live transition follows.
    ctx.orchestrator.service("llm").unwrap().adopt(None);
    let frame: Response = flo_wire::read_frame(&mut client_read, Duration::from_secs(2))
        .await
        .unwrap();
    let Response::Event { event } = frame else {
        panic!("expected Event, got {frame:?}");
    };
    assert_eq!(event.service, "llm");
    assert_eq!(event.current, ServiceStatus::Healthy);

    // Client hangs up; the stream handler returns and unsubscribes.
    drop(client_write);
    drop(client_read);
    tokio::time::timeout(Duration::from_secs(2), server_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.orchestrator.bus().subscriber_count(), 0);
}

#[tokio::test]
async fn overview_reflects_registered_services() {
    let (_fake, ctx) = test_ctx_with(fleet_with_llm());
    ctx.registry.register(healthy_entry("llm", 9200));

    let Response::Overview { overview } = ask(&ctx, Request::Overview).await else {
        panic!("expected Overview");
    };
    assert_eq!(overview.healthy, vec!["llm"]);
    assert!(overview.unhealthy.is_empty());
}
