// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::admin::Admin;
use crate::dispatch::{Dispatcher, FakeDispatcher};
use flo_core::test_support::{healthy_entry, pipeline, step};
use flo_registry::{Locator, ServiceRegistry};
use serde_json::json;

struct Harness {
    registry: Arc<ServiceRegistry>,
    fake: Arc<FakeDispatcher>,
    engine: PipelineEngine,
}

fn harness() -> Harness {
    let registry = Arc::new(ServiceRegistry::new());
    let locator = Arc::new(Locator::new(Arc::clone(&registry)));
    let admin = Arc::new(Admin::new(Arc::clone(&locator), vec![]));
    let fake = Arc::new(FakeDispatcher::new());
    let dispatch = Arc::new(DispatchService::new(
        locator,
        Arc::clone(&fake) as Arc<dyn Dispatcher>,
        admin,
    ));
    Harness {
        registry,
        fake,
        engine: PipelineEngine::new(dispatch),
    }
}

fn rag_chat() -> Pipeline {
    pipeline(
        "rag-chat",
        vec![
            step("retrieve", "rag", "search", &[]),
            step("generate", "llm", "generate", &["retrieve"]),
        ],
    )
}

#[test]
fn register_requires_an_id() {
    let h = harness();
    let mut p = rag_chat();
    p.id = "".to_string();
    assert_eq!(h.engine.register(p), Err(PipelineError::MissingId));
}

#[test]
fn register_rejects_duplicate_step_ids() {
    let h = harness();
    let p = pipeline(
        "dup",
        vec![step("a", "llm", "x", &[]), step("a", "llm", "y", &[])],
    );
    assert_eq!(
        h.engine.register(p),
        Err(PipelineError::DuplicateStep("a".to_string()))
    );
}

#[test]
fn register_get_delete_round_trip() {
    let h = harness();
    let stored = h.engine.register(rag_chat()).unwrap();
    assert_ne!(stored.created_at_ms, 0);

    assert_eq!(h.engine.get("rag-chat").unwrap().id, "rag-chat");
    assert_eq!(h.engine.list().len(), 1);

    h.engine.delete("rag-chat").unwrap();
    assert_eq!(
        h.engine.get("rag-chat"),
        Err(PipelineError::NotFound("rag-chat".to_string()))
    );
    assert_eq!(
        h.engine.delete("rag-chat"),
        Err(PipelineError::NotFound("rag-chat".to_string()))
    );
}

#[tokio::test]
async fn execute_unknown_pipeline_is_not_found() {
    let h = harness();
    let err = h
        .engine
        .execute("ghost", json!(null), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, PipelineError::NotFound("ghost".to_string()));
}

#[tokio::test]
async fn execute_propagates_outputs_in_declared_order() {
    let h = harness();
    h.registry.register(healthy_entry("rag", 9300));
    h.registry.register(healthy_entry("llm", 9200));
    h.fake.respond("search", json!({"docs": ["a", "b"]}));
    h.fake.respond("generate", json!({"text": "answer"}));

    h.engine.register(rag_chat()).unwrap();
    let execution = h
        .engine
        .execute("rag-chat", json!("hello"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(execution.id.starts_with("exec-"));
    assert_eq!(execution.steps.len(), 2);
    assert!(execution
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));
    assert!(execution.steps[0].started_at_ms <= execution.steps[1].started_at_ms);
    assert_eq!(execution.output, json!({"text": "answer"}));
    assert!(execution.completed_at_ms >= execution.started_at_ms);

    // The first step got the pipeline input; the second got the
    // retrieve output keyed by step id.
    let calls = h.fake.calls();
    assert_eq!(calls[0].1, "search");
    assert_eq!(calls[0].2, json!({"input": "hello"}));
    assert_eq!(calls[1].1, "generate");
    assert_eq!(calls[1].2, json!({"retrieve": {"docs": ["a", "b"]}}));
}

#[tokio::test]
async fn missing_dependency_fails_immediately() {
    let h = harness();
    h.registry.register(healthy_entry("llm", 9200));
    let p = pipeline(
        "broken",
        vec![step("generate", "llm", "generate", &["missing"])],
    );
    h.engine.register(p).unwrap();

    let execution = h
        .engine
        .execute("broken", json!("hi"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution
        .error
        .as_deref()
        .unwrap_or("")
        .contains("dependency not satisfied"));
    // No dispatch ever happened.
    assert!(h.fake.calls().is_empty());
}

#[tokio::test]
async fn step_refusal_fails_the_execution() {
    let h = harness();
    h.registry.register(healthy_entry("rag", 9300));
    h.registry.register(healthy_entry("llm", 9200));
    h.fake.refuse("search", "index offline");

    h.engine.register(rag_chat()).unwrap();
    let execution = h
        .engine
        .execute("rag-chat", json!("hi"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.steps.len(), 1);
    assert_eq!(execution.steps[0].status, StepStatus::Failed);
    assert!(execution.error.as_deref().unwrap_or("").contains("index offline"));
    // The dependent step never ran.
    assert_eq!(h.fake.calls().len(), 1);
}

#[tokio::test]
async fn dispatch_error_fails_the_execution() {
    let h = harness();
    // llm never registered: locate fails inside dispatch.
    h.registry.register(healthy_entry("rag", 9300));
    h.engine.register(rag_chat()).unwrap();

    let execution = h
        .engine
        .execute("rag-chat", json!("hi"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.steps.len(), 2);
    assert_eq!(execution.steps[1].status, StepStatus::Failed);
    assert!(execution
        .error
        .as_deref()
        .unwrap_or("")
        .contains("no healthy instance"));
}

#[tokio::test]
async fn executions_are_retained_and_listed() {
    let h = harness();
    h.registry.register(healthy_entry("rag", 9300));
    h.registry.register(healthy_entry("llm", 9200));
    h.engine.register(rag_chat()).unwrap();

    let first = h
        .engine
        .execute("rag-chat", json!("one"), &CancellationToken::new())
        .await
        .unwrap();
    let second = h
        .engine
        .execute("rag-chat", json!("two"), &CancellationToken::new())
        .await
        .unwrap();
    assert_ne!(first.id, second.id);

    let listed = h.engine.list_executions();
    assert_eq!(listed.len(), 2);
    assert_eq!(h.engine.get_execution(&first.id).unwrap().id, first.id);

    // Terminal records are immutable: re-reading returns the same data.
    let again = h.engine.get_execution(&first.id).unwrap();
    assert_eq!(again, h.engine.get_execution(&first.id).unwrap());
}

#[tokio::test]
async fn pre_cancelled_token_cancels_before_any_step() {
    let h = harness();
    h.engine.register(rag_chat()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let execution = h
        .engine
        .execute("rag-chat", json!("hi"), &cancel)
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    assert!(execution.steps.is_empty());
    assert!(h.fake.calls().is_empty());
}
