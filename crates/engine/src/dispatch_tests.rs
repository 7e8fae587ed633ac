// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use flo_core::test_support::healthy_entry;
use flo_registry::ServiceRegistry;
use parking_lot::Mutex;
use serde_json::json;

struct Harness {
    registry: Arc<ServiceRegistry>,
    admin: Arc<Admin>,
    fake: Arc<FakeDispatcher>,
    service: DispatchService,
}

fn harness() -> Harness {
    let registry = Arc::new(ServiceRegistry::new());
    let locator = Arc::new(Locator::new(Arc::clone(&registry)));
    let admin = Arc::new(Admin::new(Arc::clone(&locator), vec!["llm".to_string()]));
    let fake = Arc::new(FakeDispatcher::new());
    let service = DispatchService::new(
        locator,
        Arc::clone(&fake) as Arc<dyn Dispatcher>,
        Arc::clone(&admin),
    );
    Harness {
        registry,
        admin,
        fake,
        service,
    }
}

fn request(service_type: &str, operation: &str, payload: serde_json::Value) -> DispatchRequest {
    DispatchRequest {
        service_type: service_type.to_string(),
        operation: operation.to_string(),
        payload,
        parameters: Default::default(),
        request_id: None,
        timeout_ms: None,
    }
}

#[tokio::test]
async fn empty_service_type_is_invalid_argument() {
    let h = harness();
    let err = h
        .service
        .execute(request("", "generate", json!(null)), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), flo_core::ErrorKind::InvalidArgument);
    // Validation failures have no side effects.
    assert_eq!(h.admin.metrics().total, 0);
    assert!(h.admin.errors(None).is_empty());
}

#[tokio::test]
async fn empty_operation_is_invalid_argument() {
    let h = harness();
    let err = h
        .service
        .execute(request("llm", "  ", json!(null)), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), flo_core::ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let h = harness();
    let err = h
        .service
        .execute(request("llm", "generate", json!(null)), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NoHealthyInstance(ref n) if n == "llm"));
    assert_eq!(err.kind(), flo_core::ErrorKind::NotFound);
}

#[tokio::test]
async fn success_records_metrics_and_returns_output() {
    let h = harness();
    h.registry.register(healthy_entry("llm", 9200));
    h.fake.respond("generate", json!({"text": "hi"}));

    let response = h
        .service
        .execute(
            request("llm", "generate", json!({"prompt": "hello"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.output, json!({"text": "hi"}));
    assert!(response.request_id.starts_with("req-"));

    let metrics = h.admin.metrics();
    assert_eq!(metrics.total, 1);
    assert_eq!(metrics.succeeded, 1);
    assert!(h.admin.errors(None).is_empty());

    let calls = h.fake.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "llm");
    assert_eq!(calls[0].1, "generate");
}

#[tokio::test]
async fn explicit_request_id_is_preserved() {
    let h = harness();
    h.registry.register(healthy_entry("llm", 9200));

    let mut req = request("llm", "generate", json!("x"));
    req.request_id = Some("req-fixed".to_string());
    let response = h
        .service
        .execute(req, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.request_id, "req-fixed");
}

#[tokio::test]
async fn worker_refusal_is_recorded_but_not_an_error() {
    let h = harness();
    h.registry.register(healthy_entry("llm", 9200));
    h.fake.refuse("generate", "context too long");

    let response = h
        .service
        .execute(request("llm", "generate", json!("x")), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("context too long"));

    let metrics = h.admin.metrics();
    assert_eq!(metrics.failed, 1);
    let errors = h.admin.errors(None);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("context too long"));
}

#[tokio::test]
async fn transport_failure_surfaces_and_records() {
    let h = harness();
    h.registry.register(healthy_entry("llm", 9200));
    h.fake.fail("generate", "connection reset");

    let err = h
        .service
        .execute(request("llm", "generate", json!("x")), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport(_)));

    assert_eq!(h.admin.metrics().failed, 1);
    assert_eq!(h.admin.errors(None).len(), 1);
}

#[tokio::test]
async fn error_hook_stamps_the_service() {
    let registry = Arc::new(ServiceRegistry::new());
    let locator = Arc::new(Locator::new(Arc::clone(&registry)));
    let admin = Arc::new(Admin::new(Arc::clone(&locator), vec![]));
    let fake = Arc::new(FakeDispatcher::new());
    let stamped: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stamped);
    let service = DispatchService::new(
        locator,
        Arc::clone(&fake) as Arc<dyn Dispatcher>,
        admin,
    )
    .with_error_hook(Arc::new(move |svc, msg| {
        sink.lock().push((svc.to_string(), msg.to_string()));
    }));

    registry.register(healthy_entry("llm", 9200));
    fake.fail("generate", "boom");
    let _ = service
        .execute(request("llm", "generate", json!("x")), &CancellationToken::new())
        .await;

    let stamped = stamped.lock();
    assert_eq!(stamped.len(), 1);
    assert_eq!(stamped[0].0, "llm");
    assert!(stamped[0].1.contains("boom"));
}

struct SlowDispatcher;

#[async_trait]
impl Dispatcher for SlowDispatcher {
    async fn invoke(
        &self,
        _entry: &ServiceEntry,
        _request: WorkerRequest,
        _timeout: Duration,
    ) -> Result<WorkerResponse, DispatchError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(WorkerResponse::serving())
    }
}

#[tokio::test]
async fn cancellation_aborts_the_dispatch() {
    let registry = Arc::new(ServiceRegistry::new());
    let locator = Arc::new(Locator::new(Arc::clone(&registry)));
    let admin = Arc::new(Admin::new(Arc::clone(&locator), vec![]));
    let service = DispatchService::new(locator, Arc::new(SlowDispatcher), Arc::clone(&admin));

    registry.register(healthy_entry("llm", 9200));

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = service
        .execute(request("llm", "generate", json!("x")), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
    assert_eq!(err.kind(), flo_core::ErrorKind::Cancelled);
    assert_eq!(admin.errors(None).len(), 1);
}
