//! Workflow lifecycle integration tests.
//!
//! Start, update, resume, complete and cancel against the scripted backend,
//! including what happens to local state when the backend refuses.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use wizard::workflow::{StepName, WorkflowData, WorkflowStatus};
use wizard::{Error, FileBackend, WorkflowEngine, WorkflowEvent};

use crate::fixtures::{
    complete_software_asset, data, drain, engine, engine_with_events, validator, ScriptedBackend,
    CANCEL, COMPLETE, RESUME, START, UPDATE_STEP,
};

/// Test: Starting with empty data
/// Given an empty initial payload
/// When the workflow starts
/// Then it sits on the first step, active, with no data
#[tokio::test]
async fn test_start_with_empty_data() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);

    let state = assert_ok!(engine.start(Some(WorkflowData::new())).await);

    assert_eq!(state.current_step, StepName::BasicInfo);
    assert_eq!(state.status, WorkflowStatus::Active);
    assert!(state.data.is_empty());
    assert!(engine.is_autosave_armed());
    assert_eq!(backend.calls(START), 1);
}

/// Test: Failed start leaves nothing behind
#[tokio::test]
async fn test_failed_start_leaves_state_absent() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.fail_next(START, 1);
    let engine = engine(&backend);

    let err = assert_err!(engine.start(None).await);
    assert!(err.is_backend());
    assert!(!engine.is_active().await);
    assert!(!engine.is_autosave_armed());
    assert!(engine.error().unwrap().contains("start failed"));
}

/// Test: Valid basic info
/// Given a device named PLC-01
/// When basic_info is updated
/// Then the backend verdict is valid and local state mirrors the backend
#[tokio::test]
async fn test_update_basic_info_is_valid() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    let state = engine.start(Some(WorkflowData::new())).await.unwrap();

    let results = assert_ok!(
        engine
            .update_step(
                StepName::BasicInfo,
                data(json!({"asset_type": "Device", "asset_name": "PLC-01"})),
            )
            .await
    );

    assert!(results.is_valid);
    let local = engine.current().await.unwrap();
    let stored = backend.inner().stored(state.id).await.unwrap();
    assert_eq!(local.data, stored.state.data);
}

/// Test: Pattern mismatch is reported as data, not as an error
#[tokio::test]
async fn test_update_with_bad_name_reports_pattern_mismatch() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(None).await.unwrap();

    let results = engine
        .update_step(
            StepName::BasicInfo,
            data(json!({"asset_type": "Device", "asset_name": "-bad name!"})),
        )
        .await
        .unwrap();

    assert!(!results.is_valid);
    assert!(results.has_error_for("asset_name"));
    assert!(engine.error().is_none());
}

/// Test: Failed update leaves local state untouched
#[tokio::test]
async fn test_failed_update_leaves_state_unchanged() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine
        .start(Some(data(json!({"asset_type": "Device"}))))
        .await
        .unwrap();
    let before = engine.current().await.unwrap();

    backend.fail_next(UPDATE_STEP, 1);
    assert_err!(
        engine
            .update_step(StepName::BasicInfo, data(json!({"asset_name": "PLC-01"})))
            .await
    );

    assert_eq!(engine.current().await.unwrap(), before);
    assert!(engine.error().unwrap().contains("update_step failed"));
}

/// Test: Operations without a workflow
#[tokio::test]
async fn test_no_active_workflow() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);

    assert!(matches!(
        engine.update_step(StepName::BasicInfo, WorkflowData::new()).await,
        Err(Error::NoActiveWorkflow)
    ));
    assert!(matches!(engine.previous_step().await, Err(Error::NoActiveWorkflow)));
    assert!(matches!(engine.step_context().await, Err(Error::NoActiveWorkflow)));
    assert_eq!(backend.calls(UPDATE_STEP), 0);
}

/// Test: Completion refused locally
/// Given a review step without confirmation
/// When completing
/// Then the call fails with a validation error and the backend is not called
#[tokio::test]
async fn test_complete_invalid_step_never_reaches_backend() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    let mut fields = complete_software_asset();
    fields.insert("confirmed", json!(false));
    engine.start(Some(fields)).await.unwrap();
    engine.navigate_to_step(StepName::Review).await.unwrap();

    let err = assert_err!(engine.complete_workflow().await);
    assert!(matches!(err, Error::Validation(ref summary) if summary.contains("confirmed")));
    assert_eq!(backend.calls(COMPLETE), 0);
    assert!(engine.is_active().await);
}

/// Test: Failed completion preserves everything
/// Given a valid review step
/// When the backend refuses to complete
/// Then step, data and autosave are unchanged and a retry succeeds
#[tokio::test]
async fn test_failed_complete_preserves_state_and_autosave() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(Some(complete_software_asset())).await.unwrap();
    engine.navigate_to_step(StepName::Review).await.unwrap();
    let before = engine.current().await.unwrap();

    backend.fail_next(COMPLETE, 1);
    assert_err!(engine.complete_workflow().await);

    let after = engine.current().await.unwrap();
    assert_eq!(after.current_step, before.current_step);
    assert_eq!(after.data, before.data);
    assert_eq!(after, before);
    assert!(engine.is_autosave_armed());
    assert!(engine.error().unwrap().contains("complete failed"));

    let entity_id = assert_ok!(engine.complete_workflow().await);
    assert!(entity_id.starts_with("asset-"));
    assert!(!engine.is_active().await);
    assert!(!engine.is_autosave_armed());
}

/// Test: Failed cancellation keeps the workflow resumable
#[tokio::test]
async fn test_failed_cancel_keeps_workflow_resumable() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    let state = engine.start(None).await.unwrap();

    backend.fail_next(CANCEL, 1);
    assert_err!(engine.cancel_workflow().await);
    assert!(engine.is_active().await);
    assert!(engine.is_autosave_armed());

    // A second client can still pick it up.
    let other = crate::fixtures::engine(&backend);
    let resumed = assert_ok!(other.resume(state.id).await);
    assert_eq!(resumed.status, WorkflowStatus::Active);
}

/// Test: Successful cancellation clears and disarms
#[tokio::test]
async fn test_cancel_clears_state_and_disarms() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    let state = engine.start(None).await.unwrap();

    assert_ok!(engine.cancel_workflow().await);

    assert!(!engine.is_active().await);
    assert!(engine.session().await.is_none());
    assert!(engine.autosave_status().await.is_none());
    assert!(!engine.is_autosave_armed());
    assert_eq!(
        backend.inner().stored(state.id).await.unwrap().state.status,
        WorkflowStatus::Cancelled
    );

    // Cancelled workflows cannot be resumed.
    assert_err!(engine.resume(state.id).await);
}

/// Test: Resume picks up step and data
#[tokio::test]
async fn test_resume_restores_step_and_data() {
    let backend = Arc::new(ScriptedBackend::new());
    let first = engine(&backend);
    let state = first
        .start(Some(data(json!({"asset_type": "Software", "asset_name": "historian"}))))
        .await
        .unwrap();
    first.next_step().await.unwrap();
    first.reset().await;
    assert!(!first.is_autosave_armed());

    let second = engine(&backend);
    let resumed = second.resume(state.id).await.unwrap();
    assert_eq!(resumed.current_step, StepName::Hierarchy);
    assert_eq!(resumed.data.get_str("asset_name"), Some("historian"));
    assert!(second.is_autosave_armed());
    assert_eq!(second.history().await.len(), 1);
    assert_eq!(backend.calls(RESUME), 1);
}

/// Test: Lifecycle events arrive in order
#[tokio::test]
async fn test_lifecycle_events() {
    let backend = Arc::new(ScriptedBackend::new());
    let (engine, mut rx) = engine_with_events(&backend);
    let state = engine.start(Some(complete_software_asset())).await.unwrap();
    engine.next_step().await.unwrap();
    engine.cancel_workflow().await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            WorkflowEvent::Started {
                workflow_id: state.id,
                step: StepName::BasicInfo
            },
            WorkflowEvent::StepChanged {
                workflow_id: state.id,
                from: StepName::BasicInfo,
                to: StepName::Hierarchy
            },
            WorkflowEvent::Cancelled {
                workflow_id: state.id
            },
        ]
    );
}

/// Test: File backend survives a new process
/// Given a workflow driven through the file backend
/// When a fresh backend and engine open the same file
/// Then the workflow resumes where it was left
#[tokio::test]
async fn test_file_backend_persists_between_engines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workflows.json");

    let id = {
        let backend = Arc::new(FileBackend::new(&path, validator().with_asset_rules()));
        let engine = WorkflowEngine::new(backend, validator());
        let state = engine.start(Some(complete_software_asset())).await.unwrap();
        engine.navigate_to_step(StepName::Security).await.unwrap();
        engine.reset().await;
        state.id
    };

    let backend = Arc::new(FileBackend::new(&path, validator().with_asset_rules()));
    let engine = WorkflowEngine::new(backend, validator());
    let resumed = engine.resume(id).await.unwrap();
    assert_eq!(resumed.current_step, StepName::Security);
    assert_eq!(resumed.data, complete_software_asset());

    engine.navigate_to_step(StepName::Review).await.unwrap();
    assert_ok!(engine.complete_workflow().await);
}
