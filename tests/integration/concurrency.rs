//! Interleaving and session integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;

use wizard::engine::DraftSave;
use wizard::util::{Clock, ManualClock};
use wizard::workflow::StepName;
use wizard::{InMemoryBackend, WorkflowEngine};

use crate::fixtures::{data, engine, validator, ScriptedBackend, SAVE_DRAFT, UPDATE_STEP};

/// Test: Out-of-order update responses
/// Given two name edits where the first response is slower
/// When both resolve
/// Then the later request's response is the one kept
#[tokio::test(start_paused = true)]
async fn test_last_request_wins_for_updates() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    let state = engine.start(None).await.unwrap();

    backend.queue_latency(UPDATE_STEP, Duration::from_millis(300));
    backend.queue_latency(UPDATE_STEP, Duration::from_millis(10));

    let (first, second) = tokio::join!(
        engine.update_step(StepName::BasicInfo, data(json!({"asset_name": "PLC-0"}))),
        engine.update_step(StepName::BasicInfo, data(json!({"asset_name": "PLC-01"}))),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(backend.calls(UPDATE_STEP), 2);
    let local = engine.current().await.unwrap();
    assert_eq!(local.data.get_str("asset_name"), Some("PLC-01"));
    let stored = backend.inner().stored(state.id).await.unwrap();
    assert_eq!(stored.state.data, local.data);
}

/// Test: Edits to different fields both land
#[tokio::test]
async fn test_sequential_updates_accumulate() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(None).await.unwrap();

    engine
        .update_step(StepName::BasicInfo, data(json!({"asset_type": "Network"})))
        .await
        .unwrap();
    let results = engine
        .update_step(StepName::BasicInfo, data(json!({"asset_name": "core-switch"})))
        .await
        .unwrap();

    assert!(results.is_valid);
    let local = engine.current().await.unwrap();
    assert_eq!(local.data.get_str("asset_type"), Some("Network"));
    assert_eq!(local.data.get_str("asset_name"), Some("core-switch"));
}

/// Test: Changing the metadata schema clears schema-bound fields
#[tokio::test]
async fn test_schema_change_resets_dependent_metadata() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(None).await.unwrap();

    engine
        .update_step(
            StepName::Metadata,
            data(json!({"metadata_schema_id": "plc-v1", "metadata": {"firmware": "2.1"}})),
        )
        .await
        .unwrap();
    engine
        .update_step(StepName::Metadata, data(json!({"metadata_schema_id": "plc-v1"})))
        .await
        .unwrap();
    assert_eq!(
        engine.current().await.unwrap().data.get("metadata"),
        Some(&json!({"firmware": "2.1"}))
    );

    engine
        .update_step(StepName::Metadata, data(json!({"metadata_schema_id": "hmi-v2"})))
        .await
        .unwrap();
    assert_eq!(
        engine.current().await.unwrap().data.get("metadata"),
        Some(&json!({}))
    );
}

/// Test: Expired sessions still defer to the backend
#[tokio::test]
async fn test_expired_session_is_reported_but_not_enforced() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let inner = InMemoryBackend::asset_creation()
        .unwrap()
        .with_session_ttl(chrono::Duration::hours(1))
        .with_clock(clock.clone());
    let backend = Arc::new(ScriptedBackend::wrap(inner));
    let engine = WorkflowEngine::builder(backend.clone(), validator())
        .with_clock(clock.clone())
        .build();

    let state = engine.start(None).await.unwrap();
    assert!(!engine.is_session_expired().await);

    clock.advance(chrono::Duration::hours(2));
    assert!(engine.is_session_expired().await);

    let results = engine
        .update_step(
            StepName::BasicInfo,
            data(json!({"asset_type": "Device", "asset_name": "PLC-01"})),
        )
        .await
        .unwrap();
    assert!(results.is_valid);

    let stored = backend.inner().stored(state.id).await.unwrap();
    assert_eq!(stored.state.updated_at, clock.now());
}

/// Test: Two engines drive two workflows independently
#[tokio::test]
async fn test_engines_are_independent() {
    let backend = Arc::new(ScriptedBackend::new());
    let a = engine(&backend);
    let b = engine(&backend);

    let first = a
        .start(Some(data(json!({"asset_type": "Device", "asset_name": "PLC-01"}))))
        .await
        .unwrap();
    let second = b.start(None).await.unwrap();
    assert_ne!(first.id, second.id);

    assert!(a.next_step().await.unwrap().is_moved());
    assert_eq!(a.current_step().await, Some(StepName::Hierarchy));
    assert_eq!(b.current_step().await, Some(StepName::BasicInfo));

    a.reset().await;
    assert!(b.is_active().await);
}

/// Test: A burst of manual saves reaches the backend once
#[tokio::test(start_paused = true)]
async fn test_concurrent_saves_collapse_to_one() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.set_latency(SAVE_DRAFT, Duration::from_millis(50));
    let engine = engine(&backend);
    engine.start(None).await.unwrap();

    let results = join_all((0..5).map(|_| engine.save_workflow_draft())).await;
    let saved = results
        .iter()
        .filter(|r| matches!(r, Ok(DraftSave::Saved { .. })))
        .count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r, Ok(DraftSave::Skipped)))
        .count();

    assert_eq!((saved, skipped), (1, 4));
    assert_eq!(backend.calls(SAVE_DRAFT), 1);
}
