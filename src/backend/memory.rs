//! In-process reference backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CompleteResponse, StartResponse, UpdateStepResponse, WorkflowBackend};
use crate::steps::{StepRegistry, Validator};
use crate::util::{Clock, SystemClock};
use crate::workflow::{
    AutoSaveConfig, StepName, WorkflowData, WorkflowId, WorkflowSession, WorkflowState,
    WorkflowStatus, WorkflowType,
};
use crate::{wlog_debug, Error, Result};

/// How long a freshly issued session stays valid.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 8;

/// Server-side record of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub state: WorkflowState,
    #[serde(default)]
    pub last_draft_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub drafts_saved: u32,
    #[serde(default)]
    pub entity_id: Option<String>,
}

/// All workflows a backend knows about.
///
/// Holds the server-side rules so that `InMemoryBackend` and `FileBackend`
/// behave identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStore {
    #[serde(default)]
    pub workflows: HashMap<WorkflowId, StoredWorkflow>,
}

impl BackendStore {
    pub fn get(&self, id: WorkflowId) -> Option<&StoredWorkflow> {
        self.workflows.get(&id)
    }

    fn live_mut(&mut self, id: WorkflowId) -> Result<&mut StoredWorkflow> {
        let stored = self
            .workflows
            .get_mut(&id)
            .ok_or_else(|| Error::WorkflowNotFound(id.to_string()))?;
        if stored.state.status.is_terminal() {
            return Err(Error::Backend(format!(
                "workflow {} is already {}",
                id.short(),
                stored.state.status
            )));
        }
        Ok(stored)
    }

    pub fn start(
        &mut self,
        validator: &Validator,
        workflow_type: WorkflowType,
        initial_data: Option<WorkflowData>,
        autosave: &AutoSaveConfig,
        session_ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> StartResponse {
        let id = WorkflowId::new();
        let state = WorkflowState::new(
            id,
            workflow_type,
            validator.registry().first(),
            initial_data.unwrap_or_default(),
            now,
        );
        let session = WorkflowSession {
            workflow_id: id,
            session_token: Uuid::new_v4().simple().to_string(),
            expires_at: now + session_ttl,
            auto_save: autosave.clone(),
        };
        self.workflows.insert(
            id,
            StoredWorkflow {
                state: state.clone(),
                last_draft_at: None,
                drafts_saved: 0,
                entity_id: None,
            },
        );
        StartResponse { session, state }
    }

    pub fn update_step(
        &mut self,
        validator: &Validator,
        id: WorkflowId,
        step: StepName,
        step_data: &WorkflowData,
        now: DateTime<Utc>,
    ) -> Result<UpdateStepResponse> {
        let resets = validator.registry().resets();
        let stored = self.live_mut(id)?;
        stored.state.data.merge(step_data, &resets);
        stored.state.updated_at = stored.state.updated_at.max(now);
        let validation = validator.validate(step, &stored.state.data);
        Ok(UpdateStepResponse {
            state: stored.state.clone(),
            validation,
        })
    }

    /// Move to `target`. Moving forward requires every step being left
    /// behind to validate.
    pub fn advance_step(
        &mut self,
        validator: &Validator,
        id: WorkflowId,
        target: StepName,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let registry = validator.registry();
        if !registry.contains(target) {
            return Err(Error::UnknownStep(target.to_string()));
        }
        let stored = self.live_mut(id)?;
        for step in registry.span(stored.state.current_step, target) {
            let results = validator.validate(step, &stored.state.data);
            if !results.is_valid {
                return Err(Error::Backend(format!(
                    "cannot leave {}: {}",
                    step,
                    results.summary()
                )));
            }
        }
        stored.state.current_step = target;
        stored.state.updated_at = stored.state.updated_at.max(now);
        Ok(())
    }

    pub fn save_draft(&mut self, id: WorkflowId, draft: WorkflowData, now: DateTime<Utc>) -> Result<()> {
        let stored = self.live_mut(id)?;
        stored.state.data = draft;
        stored.state.updated_at = stored.state.updated_at.max(now);
        stored.last_draft_at = Some(now);
        stored.drafts_saved += 1;
        Ok(())
    }

    pub fn resume(&mut self, id: WorkflowId) -> Result<WorkflowState> {
        Ok(self.live_mut(id)?.state.clone())
    }

    /// Create the asset once every step validates.
    pub fn complete(
        &mut self,
        validator: &Validator,
        id: WorkflowId,
        now: DateTime<Utc>,
    ) -> Result<CompleteResponse> {
        let stored = self.live_mut(id)?;
        for config in validator.registry().steps() {
            let results = validator.validate(config.name, &stored.state.data);
            if !results.is_valid {
                return Err(Error::Backend(format!(
                    "{} is incomplete: {}",
                    config.name,
                    results.summary()
                )));
            }
        }
        let entity_id = format!("asset-{}", Uuid::new_v4().simple());
        stored.state.status = WorkflowStatus::Completed;
        stored.state.updated_at = stored.state.updated_at.max(now);
        stored.entity_id = Some(entity_id.clone());
        Ok(CompleteResponse {
            entity_id,
            state: stored.state.clone(),
        })
    }

    pub fn cancel(&mut self, id: WorkflowId, now: DateTime<Utc>) -> Result<()> {
        let stored = self.live_mut(id)?;
        stored.state.status = WorkflowStatus::Cancelled;
        stored.state.updated_at = stored.state.updated_at.max(now);
        Ok(())
    }
}

/// Reference backend that keeps every workflow in memory.
pub struct InMemoryBackend {
    validator: Validator,
    autosave: AutoSaveConfig,
    session_ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    store: Mutex<BackendStore>,
}

impl InMemoryBackend {
    pub fn new(validator: Validator) -> Self {
        Self {
            validator,
            autosave: AutoSaveConfig::default(),
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            clock: Arc::new(SystemClock),
            store: Mutex::new(BackendStore::default()),
        }
    }

    /// Backend over the asset creation steps with the built-in custom rules.
    pub fn asset_creation() -> Result<Self> {
        let validator = Validator::new(Arc::new(StepRegistry::asset_creation()))?.with_asset_rules();
        Ok(Self::new(validator))
    }

    /// Autosave settings handed out with new sessions.
    pub fn with_autosave(mut self, autosave: AutoSaveConfig) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Copy of the server-side record, for inspection.
    pub async fn stored(&self, id: WorkflowId) -> Option<StoredWorkflow> {
        self.store.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl WorkflowBackend for InMemoryBackend {
    async fn start(
        &self,
        workflow_type: WorkflowType,
        initial_data: Option<WorkflowData>,
    ) -> Result<StartResponse> {
        let mut store = self.store.lock().await;
        let response = store.start(
            &self.validator,
            workflow_type,
            initial_data,
            &self.autosave,
            self.session_ttl,
            self.clock.now(),
        );
        wlog_debug!("InMemoryBackend::start id={}", response.state.id.short());
        Ok(response)
    }

    async fn update_step(
        &self,
        workflow_id: WorkflowId,
        step: StepName,
        step_data: WorkflowData,
    ) -> Result<UpdateStepResponse> {
        let mut store = self.store.lock().await;
        store.update_step(&self.validator, workflow_id, step, &step_data, self.clock.now())
    }

    async fn advance_step(&self, workflow_id: WorkflowId, target: StepName) -> Result<()> {
        let mut store = self.store.lock().await;
        store.advance_step(&self.validator, workflow_id, target, self.clock.now())
    }

    async fn save_draft(&self, workflow_id: WorkflowId, draft: WorkflowData) -> Result<()> {
        let mut store = self.store.lock().await;
        store.save_draft(workflow_id, draft, self.clock.now())
    }

    async fn resume(&self, workflow_id: WorkflowId) -> Result<WorkflowState> {
        self.store.lock().await.resume(workflow_id)
    }

    async fn complete(&self, workflow_id: WorkflowId) -> Result<CompleteResponse> {
        let mut store = self.store.lock().await;
        store.complete(&self.validator, workflow_id, self.clock.now())
    }

    async fn cancel(&self, workflow_id: WorkflowId) -> Result<()> {
        let mut store = self.store.lock().await;
        store.cancel(workflow_id, self.clock.now())
    }
}
