//! Backend collaborator boundary.
//!
//! The engine never creates, validates or stores workflows itself; it asks a
//! `WorkflowBackend` and adopts what comes back. `InMemoryBackend` and
//! `FileBackend` are reference implementations of the server side.

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::steps::ValidationResults;
use crate::workflow::{StepName, WorkflowData, WorkflowId, WorkflowSession, WorkflowState, WorkflowType};
use crate::Result;

pub use file::FileBackend;
pub use memory::{BackendStore, InMemoryBackend, StoredWorkflow};

/// Answer to `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    pub session: WorkflowSession,
    pub state: WorkflowState,
}

/// Answer to `update_step`: the canonical state and the server's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStepResponse {
    pub state: WorkflowState,
    pub validation: ValidationResults,
}

/// Answer to `complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteResponse {
    /// Identifier of the created asset.
    pub entity_id: String,
    pub state: WorkflowState,
}

/// Request/response operations offered by the system of record.
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn start(
        &self,
        workflow_type: WorkflowType,
        initial_data: Option<WorkflowData>,
    ) -> Result<StartResponse>;

    /// `step_data` is the full merged data bag as the client sees it.
    async fn update_step(
        &self,
        workflow_id: WorkflowId,
        step: StepName,
        step_data: WorkflowData,
    ) -> Result<UpdateStepResponse>;

    async fn advance_step(&self, workflow_id: WorkflowId, target: StepName) -> Result<()>;

    async fn save_draft(&self, workflow_id: WorkflowId, draft: WorkflowData) -> Result<()>;

    async fn resume(&self, workflow_id: WorkflowId) -> Result<WorkflowState>;

    async fn complete(&self, workflow_id: WorkflowId) -> Result<CompleteResponse>;

    async fn cancel(&self, workflow_id: WorkflowId) -> Result<()>;
}
