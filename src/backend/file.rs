//! JSON-file backend used by the CLI, so a workflow survives between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::memory::DEFAULT_SESSION_TTL_HOURS;
use super::{BackendStore, CompleteResponse, StartResponse, UpdateStepResponse, WorkflowBackend};
use crate::steps::Validator;
use crate::util::{Clock, SystemClock};
use crate::workflow::{AutoSaveConfig, StepName, WorkflowData, WorkflowId, WorkflowState, WorkflowType};
use crate::{wlog_debug, Result};

/// Backend persisting a `BackendStore` as one JSON document.
///
/// Each call loads the file, applies the operation and writes it back, so
/// concurrent processes see each other's changes between calls.
pub struct FileBackend {
    path: PathBuf,
    validator: Validator,
    autosave: AutoSaveConfig,
    clock: Arc<dyn Clock>,
    io: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>, validator: Validator) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            validator,
            autosave: AutoSaveConfig::default(),
            clock: Arc::new(SystemClock),
            io: Mutex::new(()),
        }
    }

    pub fn with_autosave(mut self, autosave: AutoSaveConfig) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store; a missing file is an empty store.
    pub async fn load(&self) -> Result<BackendStore> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BackendStore::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, store: &BackendStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(store)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Load, apply `op`, and write back only if `op` succeeded.
    async fn transact<T>(&self, op: impl FnOnce(&mut BackendStore) -> Result<T>) -> Result<T> {
        let _guard = self.io.lock().await;
        let mut store = self.load().await?;
        let value = op(&mut store)?;
        self.persist(&store).await?;
        Ok(value)
    }
}

#[async_trait]
impl WorkflowBackend for FileBackend {
    async fn start(
        &self,
        workflow_type: WorkflowType,
        initial_data: Option<WorkflowData>,
    ) -> Result<StartResponse> {
        let now = self.clock.now();
        let response = self
            .transact(|store| {
                Ok(store.start(
                    &self.validator,
                    workflow_type,
                    initial_data,
                    &self.autosave,
                    chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
                    now,
                ))
            })
            .await?;
        wlog_debug!(
            "FileBackend::start id={} path={}",
            response.state.id.short(),
            self.path.display()
        );
        Ok(response)
    }

    async fn update_step(
        &self,
        workflow_id: WorkflowId,
        step: StepName,
        step_data: WorkflowData,
    ) -> Result<UpdateStepResponse> {
        let now = self.clock.now();
        self.transact(|store| store.update_step(&self.validator, workflow_id, step, &step_data, now))
            .await
    }

    async fn advance_step(&self, workflow_id: WorkflowId, target: StepName) -> Result<()> {
        let now = self.clock.now();
        self.transact(|store| store.advance_step(&self.validator, workflow_id, target, now))
            .await
    }

    async fn save_draft(&self, workflow_id: WorkflowId, draft: WorkflowData) -> Result<()> {
        let now = self.clock.now();
        self.transact(|store| store.save_draft(workflow_id, draft, now))
            .await
    }

    async fn resume(&self, workflow_id: WorkflowId) -> Result<WorkflowState> {
        let _guard = self.io.lock().await;
        self.load().await?.resume(workflow_id)
    }

    async fn complete(&self, workflow_id: WorkflowId) -> Result<CompleteResponse> {
        let now = self.clock.now();
        self.transact(|store| store.complete(&self.validator, workflow_id, now))
            .await
    }

    async fn cancel(&self, workflow_id: WorkflowId) -> Result<()> {
        let now = self.clock.now();
        self.transact(|store| store.cancel(workflow_id, now)).await
    }
}
