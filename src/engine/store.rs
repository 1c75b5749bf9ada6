//! Workflow state store.
//!
//! `WorkflowEngine` drives a single workflow through its steps. Every
//! mutation goes to the backend first and is applied locally only once the
//! backend has answered, so a failed call leaves local state exactly as it
//! was. Two `BusyLock`s keep step transitions and draft saves from
//! overlapping, and every backend call is bounded by a timeout so neither
//! lock can be held forever.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::autosave::{AutosaveScheduler, DraftSink};
use super::context::StepContext;
use super::events::{EventSink, WorkflowEvent};
use super::guard::{NavigationGuard, OverridePolicy};
use super::lock::BusyLock;
use crate::backend::WorkflowBackend;
use crate::steps::{StepRegistry, ValidationResults, Validator};
use crate::util::{with_timeout, Clock, SystemClock};
use crate::workflow::{
    ActiveWorkflow, AutoSaveConfig, DependentReset, StepHistoryEntry, StepName, WorkflowData,
    WorkflowId, WorkflowSession, WorkflowState, WorkflowType,
};
use crate::{wlog, wlog_debug, wlog_trace, wlog_warn, Error, Result};

/// Default upper bound on any single backend call.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;

/// Lifetime of the client-side session created on resume.
pub const DEFAULT_RESUMED_SESSION_TTL_HOURS: i64 = 8;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workflow_type: WorkflowType,
    pub backend_timeout: Duration,
    pub override_policy: OverridePolicy,
    /// `enabled` is a master switch over whatever the session asks for;
    /// the interval applies to resumed sessions.
    pub autosave: AutoSaveConfig,
    pub resumed_session_ttl: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_type: WorkflowType::AssetCreation,
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            override_policy: OverridePolicy::default(),
            autosave: AutoSaveConfig::default(),
            resumed_session_ttl: chrono::Duration::hours(DEFAULT_RESUMED_SESSION_TTL_HOURS),
        }
    }
}

/// Result of a step transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The backend acknowledged the move; `validation` is the verdict for
    /// the step just entered.
    Moved {
        from: StepName,
        to: StepName,
        validation: ValidationResults,
    },
    /// Validation refused the move; the backend was not called.
    Blocked { validation: ValidationResults },
    /// Another transition was in flight; nothing happened.
    Busy,
    /// There is no adjacent step in the requested direction.
    AtBoundary,
}

impl TransitionOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, TransitionOutcome::Moved { .. })
    }
}

/// Result of a draft save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSave {
    Saved { at: DateTime<Utc> },
    /// A save was already in flight; this one was dropped.
    Skipped,
}

/// Position of the current step within the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current_step: StepName,
    pub current_index: usize,
    pub total: usize,
    pub percent: u8,
}

struct EngineShared {
    backend: Arc<dyn WorkflowBackend>,
    validator: Validator,
    resets: Vec<DependentReset>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    active: RwLock<Option<ActiveWorkflow>>,
    transition_lock: BusyLock,
    save_lock: BusyLock,
    update_seq: AtomicU64,
    applied_update_seq: AtomicU64,
    last_error: Mutex<Option<String>>,
    autosave: Mutex<AutosaveScheduler>,
    events: EventSink,
}

#[async_trait]
impl DraftSink for EngineShared {
    async fn autosave_tick(self: Arc<Self>) {
        let engine = WorkflowEngine { shared: self };
        match engine.save_workflow_draft().await {
            Ok(DraftSave::Saved { at }) => wlog_trace!("autosave saved at {}", at),
            Ok(DraftSave::Skipped) => wlog_trace!("autosave tick dropped, save in flight"),
            Err(Error::NoActiveWorkflow) => wlog_trace!("autosave tick without workflow"),
            // Already recorded in the error slot; the timer keeps running.
            Err(_) => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for `WorkflowEngine`.
pub struct EngineBuilder {
    backend: Arc<dyn WorkflowBackend>,
    validator: Validator,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl EngineBuilder {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn build(self) -> WorkflowEngine {
        let resets = self.validator.registry().resets();
        WorkflowEngine {
            shared: Arc::new(EngineShared {
                backend: self.backend,
                validator: self.validator,
                resets,
                config: self.config,
                clock: self.clock,
                active: RwLock::new(None),
                transition_lock: BusyLock::new(),
                save_lock: BusyLock::new(),
                update_seq: AtomicU64::new(0),
                applied_update_seq: AtomicU64::new(0),
                last_error: Mutex::new(None),
                autosave: Mutex::new(AutosaveScheduler::new()),
                events: EventSink::new(self.events),
            }),
        }
    }
}

/// Drives one workflow at a time. Clones share the same workflow.
#[derive(Clone)]
pub struct WorkflowEngine {
    shared: Arc<EngineShared>,
}

impl WorkflowEngine {
    pub fn builder(backend: Arc<dyn WorkflowBackend>, validator: Validator) -> EngineBuilder {
        EngineBuilder {
            backend,
            validator,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            events: None,
        }
    }

    /// Engine with default settings.
    pub fn new(backend: Arc<dyn WorkflowBackend>, validator: Validator) -> Self {
        Self::builder(backend, validator).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn validator(&self) -> &Validator {
        &self.shared.validator
    }

    pub fn registry(&self) -> &StepRegistry {
        self.shared.validator.registry()
    }

    fn guard(&self) -> NavigationGuard<'_> {
        NavigationGuard::new(&self.shared.validator, self.shared.config.override_policy)
    }

    // Backend plumbing

    /// Run a backend call under the configured timeout, recording any
    /// failure in the error slot.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = with_timeout(self.shared.config.backend_timeout, fut).await;
        if let Err(e) = &result {
            self.record_error(operation, e);
        }
        result
    }

    fn record_error(&self, operation: &'static str, err: &Error) {
        let message = format!("{} failed: {}", operation, err);
        wlog_warn!("{}", message);
        *lock(&self.shared.last_error) = Some(message);
        self.shared.events.emit(WorkflowEvent::OperationFailed {
            operation,
            error: err.to_string(),
        });
    }

    /// Refuse backend states the engine cannot hold.
    fn check_adoptable(
        &self,
        operation: &'static str,
        state: &WorkflowState,
        expected: Option<WorkflowId>,
    ) -> Result<()> {
        let problem = if expected.is_some_and(|id| id != state.id) {
            Some(Error::Backend(format!(
                "answered for workflow {} instead of {}",
                state.id.short(),
                expected.map(|id| id.short()).unwrap_or_default()
            )))
        } else if !self.registry().contains(state.current_step) {
            Some(Error::UnknownStep(state.current_step.to_string()))
        } else if state.status.is_terminal() {
            Some(Error::Backend(format!(
                "workflow {} is already {}",
                state.id.short(),
                state.status
            )))
        } else {
            None
        };
        match problem {
            Some(e) => {
                self.record_error(operation, &e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn warn_if_expired(&self, active: &ActiveWorkflow) {
        if active.session().is_expired(self.shared.clock.now()) {
            wlog_warn!(
                "session for workflow {} expired at {}",
                active.id().short(),
                active.session().expires_at
            );
        }
    }

    // Autosave

    fn arm_autosave(&self, auto_save: &AutoSaveConfig) {
        let mut scheduler = lock(&self.shared.autosave);
        if auto_save.enabled && self.shared.config.autosave.enabled {
            scheduler.start(auto_save.interval(), Arc::downgrade(&self.shared));
        } else if scheduler.stop() {
            wlog_debug!("autosave disabled for this workflow");
        }
    }

    fn disarm_autosave(&self) {
        lock(&self.shared.autosave).stop();
    }

    pub fn is_autosave_armed(&self) -> bool {
        lock(&self.shared.autosave).is_running()
    }

    /// Turn autosave on or off for the active workflow.
    pub async fn set_autosave_enabled(&self, enabled: bool) -> Result<()> {
        let auto_save = {
            let mut guard = self.shared.active.write().await;
            let active = guard.as_mut().ok_or(Error::NoActiveWorkflow)?;
            active.auto_save_mut().enabled = enabled;
            active.auto_save().clone()
        };
        self.arm_autosave(&auto_save);
        Ok(())
    }

    // Lifecycle

    /// Create a workflow through the backend and arm autosave.
    pub async fn start(&self, initial_data: Option<WorkflowData>) -> Result<WorkflowState> {
        let workflow_type = self.shared.config.workflow_type;
        wlog_debug!("WorkflowEngine::start type={}", workflow_type);

        let response = self
            .call("start", self.shared.backend.start(workflow_type, initial_data))
            .await?;
        self.check_adoptable("start", &response.state, None)?;

        let state = response.state.clone();
        self.adopt(ActiveWorkflow::new(response.state, response.session))
            .await;

        wlog!("workflow {} started at {}", state.id.short(), state.current_step);
        self.shared.events.emit(WorkflowEvent::Started {
            workflow_id: state.id,
            step: state.current_step,
        });
        Ok(state)
    }

    /// Continue a workflow from a prior session and re-arm autosave.
    pub async fn resume(&self, workflow_id: WorkflowId) -> Result<WorkflowState> {
        wlog_debug!("WorkflowEngine::resume id={}", workflow_id.short());

        let state = self
            .call("resume", self.shared.backend.resume(workflow_id))
            .await?;
        self.check_adoptable("resume", &state, Some(workflow_id))?;

        let config = &self.shared.config;
        let session = WorkflowSession {
            workflow_id,
            session_token: Uuid::new_v4().simple().to_string(),
            expires_at: self.shared.clock.now() + config.resumed_session_ttl,
            auto_save: AutoSaveConfig::new(config.autosave.enabled, config.autosave.interval_seconds),
        };
        self.adopt(ActiveWorkflow::new(state.clone(), session)).await;

        wlog!("workflow {} resumed at {}", workflow_id.short(), state.current_step);
        self.shared.events.emit(WorkflowEvent::Resumed {
            workflow_id,
            step: state.current_step,
        });
        Ok(state)
    }

    async fn adopt(&self, active: ActiveWorkflow) {
        let auto_save = active.auto_save().clone();
        *self.shared.active.write().await = Some(active);
        self.shared.applied_update_seq.store(
            self.shared.update_seq.load(Ordering::SeqCst),
            Ordering::SeqCst,
        );
        self.clear_error();
        self.arm_autosave(&auto_save);
    }

    /// Merge `partial` into `step` through the backend.
    ///
    /// The backend re-validates and its state replaces the local one. When
    /// responses arrive out of order, only the most recently issued request
    /// is applied.
    pub async fn update_step(&self, step: StepName, partial: WorkflowData) -> Result<ValidationResults> {
        self.update_step_in(None, step, partial).await
    }

    /// `update_step` that refuses to touch any workflow but `expected`.
    pub(crate) async fn update_step_in(
        &self,
        expected: Option<WorkflowId>,
        step: StepName,
        partial: WorkflowData,
    ) -> Result<ValidationResults> {
        wlog_debug!("WorkflowEngine::update_step step={} fields={}", step, partial.len());
        self.registry().config(step)?;

        let (id, delta) = {
            let guard = self.shared.active.read().await;
            let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
            check_owner(active, expected, None)?;
            self.warn_if_expired(active);
            (active.id(), self.delta_for(&active.state().data, partial))
        };
        let seq = self.shared.update_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let response = self
            .call("update_step", self.shared.backend.update_step(id, step, delta))
            .await?;
        self.check_adoptable("update_step", &response.state, Some(id))?;

        {
            let mut guard = self.shared.active.write().await;
            match guard.as_mut() {
                Some(active) if active.id() == id => {
                    let applied = self.shared.applied_update_seq.load(Ordering::SeqCst);
                    if seq > applied {
                        self.shared.applied_update_seq.store(seq, Ordering::SeqCst);
                        active.replace_state(response.state);
                    } else {
                        wlog_trace!(
                            "dropping stale update_step response seq={} applied={}",
                            seq,
                            applied
                        );
                    }
                }
                _ => wlog_debug!(
                    "update_step response for {} arrived after the workflow was released",
                    id.short()
                ),
            }
        }

        self.shared.events.emit(WorkflowEvent::StepUpdated {
            workflow_id: id,
            step,
            is_valid: response.validation.is_valid,
        });
        Ok(response.validation)
    }

    /// What to send for `partial`: the partial itself plus any dependent
    /// structure that its gate changes reset.
    fn delta_for(&self, current: &WorkflowData, partial: WorkflowData) -> WorkflowData {
        let mut preview = current.clone();
        let reset = preview.merge(&partial, &self.shared.resets);
        let mut delta = partial;
        for dependent in reset {
            if !delta.contains(dependent) {
                if let Some(empty) = preview.get(dependent) {
                    delta.insert(dependent, empty.clone());
                }
            }
        }
        delta
    }

    /// Store a step-supplied verdict for `step`, replacing any previous one.
    pub async fn record_validation(&self, step: StepName, results: ValidationResults) -> Result<()> {
        self.record_validation_in(None, step, results).await
    }

    /// Record an override only while `expected` is active and sitting on `step`.
    pub(crate) async fn record_validation_in(
        &self,
        expected: Option<WorkflowId>,
        step: StepName,
        results: ValidationResults,
    ) -> Result<()> {
        let mut guard = self.shared.active.write().await;
        let active = guard.as_mut().ok_or(Error::NoActiveWorkflow)?;
        if expected.is_some() {
            check_owner(active, expected, Some(step))?;
        }
        wlog_trace!("validation override for {} is_valid={}", step, results.is_valid);
        active.record_override(step, results);
        Ok(())
    }

    pub async fn clear_validation(&self, step: StepName) -> Result<Option<ValidationResults>> {
        let mut guard = self.shared.active.write().await;
        let active = guard.as_mut().ok_or(Error::NoActiveWorkflow)?;
        Ok(active.clear_override(step))
    }

    /// Validate the current step, then have the backend create the asset.
    ///
    /// An invalid step fails with `Error::Validation` without calling the
    /// backend. A backend failure leaves the workflow and autosave as they
    /// were so the call can be retried.
    pub async fn complete_workflow(&self) -> Result<String> {
        let id = {
            let guard = self.shared.active.read().await;
            let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
            let validation = self.guard().effective_validation(active, active.current_step());
            if !validation.is_valid {
                wlog_debug!("complete refused locally: {}", validation.summary());
                return Err(Error::Validation(validation.summary()));
            }
            active.id()
        };

        let response = self
            .call("complete", self.shared.backend.complete(id))
            .await?;

        self.disarm_autosave();
        self.release(id).await;

        wlog!("workflow {} completed as {}", id.short(), response.entity_id);
        self.shared.events.emit(WorkflowEvent::Completed {
            workflow_id: id,
            entity_id: response.entity_id.clone(),
        });
        Ok(response.entity_id)
    }

    /// Abandon the workflow. On failure the workflow stays resumable.
    pub async fn cancel_workflow(&self) -> Result<()> {
        let id = {
            let guard = self.shared.active.read().await;
            guard.as_ref().ok_or(Error::NoActiveWorkflow)?.id()
        };

        self.call("cancel", self.shared.backend.cancel(id)).await?;

        self.disarm_autosave();
        self.release(id).await;

        wlog!("workflow {} cancelled", id.short());
        self.shared.events.emit(WorkflowEvent::Cancelled { workflow_id: id });
        Ok(())
    }

    /// Drop local state and disarm autosave without telling the backend.
    pub async fn reset(&self) {
        self.disarm_autosave();
        self.shared.active.write().await.take();
        self.clear_error();
        wlog_debug!("WorkflowEngine::reset");
        self.shared.events.emit(WorkflowEvent::Reset);
    }

    async fn release(&self, id: WorkflowId) {
        let mut guard = self.shared.active.write().await;
        if guard.as_ref().is_some_and(|active| active.id() == id) {
            guard.take();
        }
    }

    // Navigation

    pub async fn can_navigate_next(&self) -> bool {
        let guard = self.shared.active.read().await;
        guard
            .as_ref()
            .is_some_and(|active| self.guard().can_navigate_next(active))
    }

    pub async fn can_navigate_previous(&self) -> bool {
        let guard = self.shared.active.read().await;
        guard
            .as_ref()
            .is_some_and(|active| self.guard().can_navigate_previous(active))
    }

    pub async fn can_navigate_to(&self, target: StepName) -> bool {
        let guard = self.shared.active.read().await;
        guard
            .as_ref()
            .is_some_and(|active| self.guard().can_navigate_to(active, target))
    }

    pub async fn navigate_to_step(&self, target: StepName) -> Result<TransitionOutcome> {
        self.handle_step_transition(target, false).await
    }

    pub async fn next_step(&self) -> Result<TransitionOutcome> {
        let next = {
            let guard = self.shared.active.read().await;
            let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
            self.registry().next(active.current_step())
        };
        match next {
            Some(step) => self.handle_step_transition(step, false).await,
            None => Ok(TransitionOutcome::AtBoundary),
        }
    }

    /// Step back. Never gated by validation.
    pub async fn previous_step(&self) -> Result<TransitionOutcome> {
        let previous = {
            let guard = self.shared.active.read().await;
            let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
            self.registry().previous(active.current_step())
        };
        match previous {
            Some(step) => self.handle_step_transition(step, true).await,
            None => Ok(TransitionOutcome::AtBoundary),
        }
    }

    /// Move to `target`.
    ///
    /// Returns `Busy` without side effects while another transition is in
    /// flight. Unless `skip_validation` is set, the current step must
    /// validate in either direction, and a forward move also requires every
    /// step skipped over to validate; otherwise the result is `Blocked` and
    /// the backend is not called.
    pub async fn handle_step_transition(
        &self,
        target: StepName,
        skip_validation: bool,
    ) -> Result<TransitionOutcome> {
        let Some(_transition) = self.shared.transition_lock.try_acquire() else {
            wlog_trace!("transition to {} dropped, another is in flight", target);
            return Ok(TransitionOutcome::Busy);
        };
        if !self.registry().contains(target) {
            return Err(Error::UnknownStep(target.to_string()));
        }

        let (id, from) = {
            let guard = self.shared.active.read().await;
            let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
            let from = active.current_step();
            if from == target {
                return Err(Error::InvalidStepTransition {
                    from: from.to_string(),
                    to: target.to_string(),
                });
            }
            if !skip_validation {
                let navigation = self.guard();
                let blocker = if navigation.can_navigate_to(active, target) {
                    Some(navigation.effective_validation(active, from))
                        .filter(|current| !current.is_valid)
                } else {
                    Some(
                        navigation
                            .forward_blocker(active, target)
                            .unwrap_or_else(|| navigation.effective_validation(active, from)),
                    )
                };
                if let Some(validation) = blocker {
                    wlog_debug!(
                        "transition {} -> {} blocked: {}",
                        from,
                        target,
                        validation.summary()
                    );
                    return Ok(TransitionOutcome::Blocked { validation });
                }
            }
            self.warn_if_expired(active);
            (active.id(), from)
        };

        wlog_debug!("WorkflowEngine::transition {} -> {}", from, target);
        self.call("advance_step", self.shared.backend.advance_step(id, target))
            .await?;

        let validation = {
            let mut guard = self.shared.active.write().await;
            let active = match guard.as_mut() {
                Some(active) if active.id() == id => active,
                _ => return Err(Error::NoActiveWorkflow),
            };
            active.enter_step(target, self.shared.clock.now());
            self.guard().effective_validation(active, target)
        };

        self.shared.events.emit(WorkflowEvent::StepChanged {
            workflow_id: id,
            from,
            to: target,
        });
        Ok(TransitionOutcome::Moved {
            from,
            to: target,
            validation,
        })
    }

    // Drafts

    /// Persist the current data snapshot.
    ///
    /// Returns `Skipped` when a save is already in flight. A failure is
    /// recorded in the error slot and returned, and leaves autosave armed.
    pub async fn save_workflow_draft(&self) -> Result<DraftSave> {
        let (id, draft) = {
            let guard = self.shared.active.read().await;
            let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
            (active.id(), active.state().data.clone())
        };
        let Some(_saving) = self.shared.save_lock.try_acquire() else {
            self.shared.events.emit(WorkflowEvent::DraftSkipped { workflow_id: id });
            return Ok(DraftSave::Skipped);
        };

        match self
            .call("save_draft", self.shared.backend.save_draft(id, draft))
            .await
        {
            Ok(()) => {
                let at = self.shared.clock.now();
                if let Some(active) = self.shared.active.write().await.as_mut() {
                    if active.id() == id {
                        active.auto_save_mut().last_saved = Some(at);
                    }
                }
                wlog_trace!("draft saved for {}", id.short());
                self.shared.events.emit(WorkflowEvent::DraftSaved { workflow_id: id, at });
                Ok(DraftSave::Saved { at })
            }
            Err(e) => {
                self.shared.events.emit(WorkflowEvent::DraftFailed {
                    workflow_id: id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // Queries

    pub async fn is_active(&self) -> bool {
        self.shared.active.read().await.is_some()
    }

    pub async fn current(&self) -> Option<WorkflowState> {
        self.shared
            .active
            .read()
            .await
            .as_ref()
            .map(|active| active.state().clone())
    }

    pub async fn current_step(&self) -> Option<StepName> {
        self.shared
            .active
            .read()
            .await
            .as_ref()
            .map(ActiveWorkflow::current_step)
    }

    /// Session handle with `save_in_progress` reflecting any in-flight save.
    pub async fn session(&self) -> Option<WorkflowSession> {
        let guard = self.shared.active.read().await;
        guard.as_ref().map(|active| {
            let mut session = active.session().clone();
            session.auto_save.save_in_progress = self.shared.save_lock.is_held();
            session
        })
    }

    pub async fn autosave_status(&self) -> Option<AutoSaveConfig> {
        self.session().await.map(|session| session.auto_save)
    }

    pub async fn history(&self) -> Vec<StepHistoryEntry> {
        self.shared
            .active
            .read()
            .await
            .as_ref()
            .map(|active| active.history().to_vec())
            .unwrap_or_default()
    }

    pub async fn is_session_expired(&self) -> bool {
        let now = self.shared.clock.now();
        self.shared
            .active
            .read()
            .await
            .as_ref()
            .is_some_and(|active| active.session().is_expired(now))
    }

    pub async fn progress(&self) -> Option<Progress> {
        let current_step = self.current_step().await?;
        let registry = self.registry();
        let current_index = registry.index_of(current_step)?;
        let total = registry.len();
        Some(Progress {
            current_step,
            current_index,
            total,
            percent: ((current_index + 1) * 100 / total) as u8,
        })
    }

    /// Verdict for the current step, after any override.
    pub async fn validate_current(&self) -> Result<ValidationResults> {
        let guard = self.shared.active.read().await;
        let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
        Ok(self.guard().effective_validation(active, active.current_step()))
    }

    /// Central verdict for `step` on the current data, ignoring overrides.
    pub async fn validate_step(&self, step: StepName) -> Result<ValidationResults> {
        let guard = self.shared.active.read().await;
        let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
        Ok(self.shared.validator.validate(step, &active.state().data))
    }

    /// Handle for the UI component rendering the current step.
    pub async fn step_context(&self) -> Result<StepContext> {
        let guard = self.shared.active.read().await;
        let active = guard.as_ref().ok_or(Error::NoActiveWorkflow)?;
        Ok(StepContext::new(
            self.clone(),
            active.id(),
            active.current_step(),
            active.state().data.clone(),
        ))
    }

    /// Last user-facing error message, if any.
    pub fn error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    pub fn clear_error(&self) {
        lock(&self.shared.last_error).take();
    }
}

/// Fails when `active` is not the `expected` workflow, or when it has moved
/// off `step`.
fn check_owner(
    active: &ActiveWorkflow,
    expected: Option<WorkflowId>,
    step: Option<StepName>,
) -> Result<()> {
    if expected.is_some_and(|id| id != active.id()) {
        return Err(Error::NoActiveWorkflow);
    }
    match step {
        Some(step) if step != active.current_step() => Err(Error::InvalidStepTransition {
            from: step.to_string(),
            to: active.current_step().to_string(),
        }),
        _ => Ok(()),
    }
}
