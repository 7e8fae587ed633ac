// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use flo_config::{ExternalDependency, OrchestratorConfig, ProbeConfig, ProbeKind, ServiceDef};
use flo_core::ServiceStatus;
use tokio::net::TcpListener;

fn fast_timing() -> Timing {
    Timing {
        probe_poll: Duration::from_millis(50),
        retry_backoff: Duration::from_millis(50),
        restart_pause: Duration::from_millis(50),
        dependency_poll: Duration::from_millis(50),
    }
}

fn tcp_service(short: &str, port: u16, order: i32, deps: &[&str]) -> ServiceDef {
    ServiceDef {
        name: short.to_uppercase(),
        short_name: short.to_string(),
        description: String::new(),
        version: "1.0.0".to_string(),
        grpc_port: port,
        http_port: None,
        command: vec!["/bin/sh".to_string(), "-c".to_string(), "sleep 30".to_string()],
        dependencies: deps.iter().map(|s| s.to_string()).collect(),
        external_dependencies: vec![],
        start_order: order,
        max_retries: 1,
        enabled: true,
        health_check: ProbeConfig {
            kind: ProbeKind::Tcp,
            endpoint: "/health".to_string(),
            interval: Duration::from_secs(10),
            timeout: Duration::from_millis(200),
        },
    }
}

fn fleet(services: Vec<ServiceDef>) -> FleetConfig {
    FleetConfig {
        orchestrator: OrchestratorConfig {
            binary_path: "./bin/flotilla".into(),
            log_dir: None,
            startup_timeout: Duration::from_millis(400),
            shutdown_timeout: Duration::from_secs(1),
            health_check_interval: Duration::from_secs(60),
        },
        dependencies: Default::default(),
        services,
    }
}

fn build(config: FleetConfig) -> (Arc<ServiceRegistry>, Arc<Orchestrator>) {
    let registry = Arc::new(ServiceRegistry::new());
    let orch = Orchestrator::with_timing(config, Arc::clone(&registry), fast_timing());
    (registry, orch)
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn drain_events(
    rx: &mut tokio::sync::mpsc::Receiver<flo_core::ServiceEvent>,
) -> Vec<flo_core::ServiceEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn adopts_an_existing_healthy_listener() {
    // A process already answers on the configured port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (registry, orch) = build(fleet(vec![tcp_service("llm", port, 1, &[])]));
    let (_id, mut rx) = orch.bus().subscribe();

    orch.start_all(&CancellationToken::new()).await.unwrap();

    let snap = orch.snapshot("llm").unwrap();
    assert_eq!(snap.state, ServiceState::Running);
    assert_eq!(snap.status, ServiceStatus::Healthy);
    assert!(snap.adopted);
    // The real start time is unknown, so started-at is "now" and the
    // pid is unknown.
    assert_eq!(snap.pid, 0);
    assert_ne!(snap.started_at_ms, 0);

    assert_eq!(orch.state(), OrchestratorState::Running);

    // Registry mirrors the adopted instance.
    let found = registry.discover("llm");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].port, port);

    // An Adopted event was emitted.
    let events = drain_events(&mut rx).await;
    assert!(
        events.iter().any(|e| e.message.contains("adopted")),
        "{events:?}"
    );
    // The fleet is left running; the adopted process is not ours to
    // tear down in this test.
}

#[tokio::test]
async fn start_all_adopts_in_ascending_start_order() {
    let l1 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let l2 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let l3 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (p1, p2, p3) = (
        l1.local_addr().unwrap().port(),
        l2.local_addr().unwrap().port(),
        l3.local_addr().unwrap().port(),
    );

    // Declared out of order; start order must win.
    let (_registry, orch) = build(fleet(vec![
        tcp_service("c", p3, 30, &[]),
        tcp_service("a", p1, 10, &[]),
        tcp_service("b", p2, 20, &[]),
    ]));
    let (_id, mut rx) = orch.bus().subscribe();

    orch.start_all(&CancellationToken::new()).await.unwrap();

    let order: Vec<String> = drain_events(&mut rx)
        .await
        .into_iter()
        .filter(|e| e.current == ServiceStatus::Healthy)
        .map(|e| e.service)
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn stop_all_walks_reverse_start_order() {
    let (_registry, orch) = build(fleet(vec![
        tcp_service("a", free_port().await, 10, &[]),
        tcp_service("b", free_port().await, 20, &[]),
        tcp_service("c", free_port().await, 30, &[]),
    ]));

    // Mark everything running without owning real processes.
    for name in ["a", "b", "c"] {
        orch.service(name).unwrap().adopt(None);
    }

    let (_id, mut rx) = orch.bus().subscribe();
    orch.stop_all(false).await;
    assert_eq!(orch.state(), OrchestratorState::Stopped);

    let stopping: Vec<String> = drain_events(&mut rx)
        .await
        .into_iter()
        .filter(|e| e.current == ServiceStatus::Stopping)
        .map(|e| e.service)
        .collect();
    assert_eq!(stopping, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn retry_exhaustion_fails_start_and_lands_failed() {
    let port = free_port().await;
    let mut def = tcp_service("llm", port, 1, &[]);
    def.max_retries = 2;

    let (registry, orch) = build(fleet(vec![def]));
    let err = orch.start_all(&CancellationToken::new()).await.unwrap_err();

    assert!(
        matches!(err, OrchestratorError::StartFailed { ref service, .. } if service == "llm"),
        "{err}"
    );
    assert_eq!(err.kind(), ErrorKind::StartFailed);

    let snap = orch.snapshot("llm").unwrap();
    assert_eq!(snap.state, ServiceState::Failed);
    assert_eq!(snap.restart_count, 2);
    assert!(snap.last_error.is_some());
    assert!(registry.discover("llm").is_empty());
}

#[tokio::test]
async fn failing_first_service_blocks_the_rest() {
    let (_registry, orch) = build(fleet(vec![
        tcp_service("a", free_port().await, 1, &[]),
        tcp_service("b", free_port().await, 2, &["a"]),
        tcp_service("c", free_port().await, 3, &["b"]),
    ]));

    let err = orch.start_all(&CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("\"a\""), "{err}");

    // b and c were never spawned.
    for name in ["b", "c"] {
        let snap = orch.snapshot(name).unwrap();
        assert_eq!(snap.state, ServiceState::Stopped);
        assert_eq!(snap.pid, 0);
    }
}

#[tokio::test]
async fn dependency_wait_times_out_naming_the_dependency() {
    let (_registry, orch) = build(fleet(vec![
        tcp_service("a", free_port().await, 1, &[]),
        tcp_service("b", free_port().await, 2, &["a"]),
    ]));

    let svc_b = orch.service("b").unwrap();
    let err = orch
        .wait_for_dependencies(&svc_b, &CancellationToken::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            OrchestratorError::DependencyTimeout { ref service, ref dependency }
                if service == "b" && dependency == "a"
        ),
        "{err}"
    );
    assert_eq!(err.kind(), ErrorKind::DependencyUnsatisfied);
}

#[tokio::test]
async fn dependency_wait_passes_once_healthy() {
    let (_registry, orch) = build(fleet(vec![
        tcp_service("a", free_port().await, 1, &[]),
        tcp_service("b", free_port().await, 2, &["a"]),
    ]));

    orch.service("a").unwrap().adopt(None);
    let svc_b = orch.service("b").unwrap();
    orch.wait_for_dependencies(&svc_b, &CancellationToken::new(), &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn required_external_dependency_gates_startup() {
    let mut config = fleet(vec![]);
    config.dependencies.insert(
        "ollama".to_string(),
        ExternalDependency {
            name: "Ollama".to_string(),
            kind: "http".to_string(),
            url: format!("http://127.0.0.1:{}/", free_port().await),
            required: true,
        },
    );

    let (_registry, orch) = build(config);
    let err = orch.start_all(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalDependencyUnavailable);
}

#[tokio::test]
async fn optional_external_dependency_is_not_probed() {
    let mut config = fleet(vec![]);
    config.dependencies.insert(
        "metrics".to_string(),
        ExternalDependency {
            name: "Metrics".to_string(),
            kind: "http".to_string(),
            url: format!("http://127.0.0.1:{}/", free_port().await),
            required: false,
        },
    );

    let (_registry, orch) = build(config);
    orch.start_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(orch.state(), OrchestratorState::Running);
}

#[tokio::test]
async fn cancelled_start_all_returns_cancelled() {
    let (_registry, orch) = build(fleet(vec![tcp_service("a", free_port().await, 1, &[])]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orch.start_all(&cancel).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Cancelled));
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let (_registry, orch) = build(fleet(vec![]));
    let err = orch.start_service("ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(orch.snapshot("ghost").is_err());
}

#[tokio::test]
async fn start_on_running_service_is_already_active() {
    let port = free_port().await;
    let (_registry, orch) = build(fleet(vec![tcp_service("llm", port, 1, &[])]));
    orch.service("llm").unwrap().adopt(None);

    let err = orch.start_service("llm").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyActive);
    // State unchanged.
    assert_eq!(orch.snapshot("llm").unwrap().state, ServiceState::Running);
}

#[tokio::test]
async fn stop_service_on_stopped_is_idempotent() {
    let (_registry, orch) = build(fleet(vec![tcp_service("llm", free_port().await, 1, &[])]));
    orch.stop_service("llm", false).await.unwrap();
    assert_eq!(orch.snapshot("llm").unwrap().state, ServiceState::Stopped);
}

#[tokio::test]
async fn health_pass_restarts_an_unhealthy_service() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut def = tcp_service("llm", port, 1, &[]);
    def.max_retries = 2;

    let (_registry, orch) = build(fleet(vec![def]));
    let svc = orch.service("llm").unwrap();
    // Running instance without a supervisor-owned process or stop pid.
    svc.adopt(None);

    let stop = CancellationToken::new();
    orch.run_health_pass(&stop).await;
    assert!(orch.snapshot("llm").unwrap().healthy, "probe should pass");

    let (_id, mut rx) = orch.bus().subscribe();

    // The backing process disappears.
    drop(listener);
    orch.run_health_pass(&stop).await;

    // Within two health passes a restart is initiated; the restart
    // count grows and a restarting event is emitted. The spawned
    // replacement never listens, so it ends up Failed.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snap = orch.snapshot("llm").unwrap();
        if snap.restart_count >= 1 && snap.state == ServiceState::Failed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no restart observed: {snap:?}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let events = drain_events(&mut rx).await;
    assert!(
        events.iter().any(|e| e.message.contains("restarting")),
        "{events:?}"
    );
}

#[tokio::test]
async fn health_pass_prunes_dead_services_from_registry() {
    let (registry, orch) = build(fleet(vec![tcp_service("llm", free_port().await, 1, &[])]));
    let svc = orch.service("llm").unwrap();
    svc.adopt(None);
    // Simulate the registration done on promotion.
    orch.sync_registry(&svc);
    assert_eq!(registry.discover("llm").len(), 1);

    // Service dies outside a health flip.
    svc.stop(Duration::from_secs(1), true).await.unwrap();
    orch.run_health_pass(&CancellationToken::new()).await;
    assert!(registry.discover("llm").is_empty());
}
