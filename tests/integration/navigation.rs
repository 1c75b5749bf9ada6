//! Navigation guard and step transition lock integration tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use wizard::engine::{EngineConfig, OverridePolicy, TransitionOutcome};
use wizard::steps::{FieldError, ValidationResults, CODE_REQUIRED};
use wizard::workflow::StepName;
use wizard::{Error, StepRegistry};

use crate::fixtures::{
    complete_software_asset, data, engine, engine_with, ScriptedBackend, ADVANCE_STEP,
};

fn plc() -> wizard::WorkflowData {
    data(json!({"asset_type": "Device", "asset_name": "PLC-01"}))
}

/// Test: Adjacent steps are inverse of each other
#[test]
fn test_next_and_previous_are_inverse() {
    let registry = StepRegistry::asset_creation();
    let order = registry.order();
    for step in &order[1..order.len() - 1] {
        let previous = registry.previous(*step).unwrap();
        let next = registry.next(*step).unwrap();
        assert_eq!(registry.next(previous), Some(*step));
        assert_eq!(registry.previous(next), Some(*step));
    }
}

/// Test: Missing required field blocks forward navigation
#[tokio::test]
async fn test_missing_required_field_blocks_next() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine
        .start(Some(data(json!({"asset_type": "Device"}))))
        .await
        .unwrap();

    assert!(!engine.can_navigate_next().await);
    match assert_ok!(engine.next_step().await) {
        TransitionOutcome::Blocked { validation } => {
            assert!(validation
                .errors
                .iter()
                .any(|e| e.field == "asset_name" && e.code == CODE_REQUIRED));
        }
        other => panic!("expected Blocked, got {:?}", other),
    }
    assert_eq!(backend.calls(ADVANCE_STEP), 0);
    assert_eq!(engine.current_step().await, Some(StepName::BasicInfo));
}

/// Test: Device without parent
/// Given a device on the hierarchy step with parent_id null
/// When the step reports a failing override
/// Then next is refused although the local rules have nothing against it
#[tokio::test]
async fn test_step_override_blocks_device_without_parent() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(Some(plc())).await.unwrap();
    assert!(engine.next_step().await.unwrap().is_moved());

    engine
        .update_step(StepName::Hierarchy, data(json!({"parent_id": null})))
        .await
        .unwrap();
    assert!(engine.validate_step(StepName::Hierarchy).await.unwrap().is_valid);
    assert!(engine.can_navigate_next().await);

    let ctx = engine.step_context().await.unwrap();
    ctx.on_validation(
        false,
        Some(vec![FieldError::new("parent_id", "Devices need a parent", CODE_REQUIRED)]),
    )
    .await
    .unwrap();

    assert!(!engine.can_navigate_next().await);
    assert!(matches!(
        engine.next_step().await.unwrap(),
        TransitionOutcome::Blocked { .. }
    ));
    assert_eq!(backend.calls(ADVANCE_STEP), 1);
}

/// Test: A passing override wins over failing local rules
/// Given an empty basic_info step
/// When the step reports itself valid
/// Then the guard allows next, and the backend remains the final authority
#[tokio::test]
async fn test_passing_override_wins_locally_but_backend_decides() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(None).await.unwrap();
    assert!(!engine.can_navigate_next().await);

    engine
        .record_validation(StepName::BasicInfo, ValidationResults::valid())
        .await
        .unwrap();
    assert!(engine.can_navigate_next().await);

    let err = assert_err!(engine.next_step().await);
    assert!(err.is_backend());
    assert_eq!(engine.current_step().await, Some(StepName::BasicInfo));
    assert!(engine.error().unwrap().contains("advance_step failed"));
}

/// Test: Conjunction policy needs both verdicts
#[tokio::test]
async fn test_conjunction_policy() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine_with(
        &backend,
        EngineConfig {
            override_policy: OverridePolicy::Conjunction,
            ..EngineConfig::default()
        },
    );
    engine.start(None).await.unwrap();
    engine
        .record_validation(StepName::BasicInfo, ValidationResults::valid())
        .await
        .unwrap();
    assert!(!engine.can_navigate_next().await);

    engine.update_step(StepName::BasicInfo, plc()).await.unwrap();
    assert!(engine.can_navigate_next().await);

    engine
        .record_validation(
            StepName::BasicInfo,
            ValidationResults::invalid(vec![FieldError::new(
                "asset_name",
                "Name already taken",
                "DUPLICATE",
            )]),
        )
        .await
        .unwrap();
    assert!(!engine.can_navigate_next().await);

    assert!(engine
        .clear_validation(StepName::BasicInfo)
        .await
        .unwrap()
        .is_some());
    assert!(engine.can_navigate_next().await);
}

/// Test: Stepping back is free, jumping back checks the current step
/// Given a Metadata step with no schema selected
/// When jumping back to basic_info without skipping validation
/// Then the jump is blocked without a backend call, while previous_step still moves
#[tokio::test]
async fn test_backward_jump_requires_valid_current_step() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(Some(plc())).await.unwrap();
    engine
        .update_step(StepName::Hierarchy, data(json!({"parent_id": "site-7"})))
        .await
        .unwrap();
    engine.navigate_to_step(StepName::Metadata).await.unwrap();
    assert!(!engine.validate_current().await.unwrap().is_valid);
    let advances = backend.calls(ADVANCE_STEP);

    assert!(engine.can_navigate_previous().await);
    assert!(engine.can_navigate_to(StepName::BasicInfo).await);
    match engine
        .handle_step_transition(StepName::BasicInfo, false)
        .await
        .unwrap()
    {
        TransitionOutcome::Blocked { validation } => {
            assert!(validation.has_error_for("metadata_schema_id"));
        }
        other => panic!("expected Blocked, got {:?}", other),
    }
    assert!(matches!(
        engine.navigate_to_step(StepName::BasicInfo).await.unwrap(),
        TransitionOutcome::Blocked { .. }
    ));
    assert_eq!(backend.calls(ADVANCE_STEP), advances);
    assert_eq!(engine.current_step().await, Some(StepName::Metadata));

    assert!(engine.previous_step().await.unwrap().is_moved());
    assert_eq!(engine.current_step().await, Some(StepName::Hierarchy));
    assert!(engine.navigate_to_step(StepName::BasicInfo).await.unwrap().is_moved());
    assert!(!engine.can_navigate_previous().await);
    assert_eq!(
        engine.previous_step().await.unwrap(),
        TransitionOutcome::AtBoundary
    );
}

/// Test: Forward jumps validate every step left behind
#[tokio::test]
async fn test_forward_jump_reports_first_blocking_step() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine
        .start(Some(data(json!({"asset_type": "Software", "asset_name": "historian"}))))
        .await
        .unwrap();

    match engine.navigate_to_step(StepName::Security).await.unwrap() {
        TransitionOutcome::Blocked { validation } => {
            assert!(validation.has_error_for("metadata_schema_id"));
        }
        other => panic!("expected Blocked, got {:?}", other),
    }
    assert_eq!(backend.calls(ADVANCE_STEP), 0);

    assert!(engine
        .navigate_to_step(StepName::Metadata)
        .await
        .unwrap()
        .is_moved());
}

/// Test: Staying put is not a transition
#[tokio::test]
async fn test_transition_to_current_step_is_rejected() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(None).await.unwrap();
    assert!(!engine.can_navigate_to(StepName::BasicInfo).await);
    assert!(matches!(
        engine.handle_step_transition(StepName::BasicInfo, true).await,
        Err(Error::InvalidStepTransition { .. })
    ));
}

/// Test: Moving reports the new step's verdict and records history
#[tokio::test]
async fn test_walk_to_review_records_history_and_progress() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(Some(complete_software_asset())).await.unwrap();

    for _ in 0..5 {
        match engine.next_step().await.unwrap() {
            TransitionOutcome::Moved { validation, .. } => assert!(validation.is_valid),
            other => panic!("expected Moved, got {:?}", other),
        }
    }
    assert_eq!(engine.next_step().await.unwrap(), TransitionOutcome::AtBoundary);

    let steps: Vec<_> = engine.history().await.iter().map(|h| h.step).collect();
    assert_eq!(steps, StepRegistry::asset_creation().order());

    let progress = engine.progress().await.unwrap();
    assert_eq!(progress.current_step, StepName::Review);
    assert_eq!(progress.current_index, 5);
    assert_eq!(progress.percent, 100);
}

/// Test: Rapid double next
/// Given a slow advance response
/// When next is requested twice before the first resolves
/// Then the second returns Busy and the backend sees one call
#[tokio::test(start_paused = true)]
async fn test_rapid_next_is_dropped_while_transition_in_flight() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine(&backend);
    engine.start(Some(complete_software_asset())).await.unwrap();
    backend.set_latency(ADVANCE_STEP, Duration::from_millis(200));

    let (first, second) = tokio::join!(engine.next_step(), engine.next_step());
    let outcomes = [first.unwrap(), second.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_moved()).count(), 1);
    assert!(outcomes.contains(&TransitionOutcome::Busy));
    assert_eq!(backend.calls(ADVANCE_STEP), 1);
    assert_eq!(engine.current_step().await, Some(StepName::Hierarchy));

    // The lock is free again once the first call resolved.
    assert!(engine.next_step().await.unwrap().is_moved());
    assert_eq!(backend.calls(ADVANCE_STEP), 2);
}

/// Test: A hung backend call cannot hold the transition lock
#[tokio::test(start_paused = true)]
async fn test_timeout_releases_transition_lock() {
    let backend = Arc::new(ScriptedBackend::new());
    let engine = engine_with(
        &backend,
        EngineConfig {
            backend_timeout: Duration::from_secs(1),
            ..EngineConfig::default()
        },
    );
    engine.start(Some(complete_software_asset())).await.unwrap();
    backend.set_latency(ADVANCE_STEP, Duration::from_secs(3600));

    let err = assert_err!(engine.next_step().await);
    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(engine.current_step().await, Some(StepName::BasicInfo));
    assert!(engine.error().is_some());

    backend.clear_latency(ADVANCE_STEP);
    assert!(engine.next_step().await.unwrap().is_moved());
    assert_eq!(engine.current_step().await, Some(StepName::Hierarchy));
}
