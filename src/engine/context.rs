//! Handle given to the component rendering one step.

use super::store::{TransitionOutcome, WorkflowEngine};
use crate::steps::{FieldError, ValidationResults};
use crate::workflow::{StepName, WorkflowData, WorkflowId};
use crate::Result;

/// Current step, its data snapshot, and the callbacks a step uses to talk
/// back to the engine.
#[derive(Clone)]
pub struct StepContext {
    engine: WorkflowEngine,
    workflow_id: WorkflowId,
    step: StepName,
    data: WorkflowData,
}

impl StepContext {
    pub(crate) fn new(
        engine: WorkflowEngine,
        workflow_id: WorkflowId,
        step: StepName,
        data: WorkflowData,
    ) -> Self {
        Self {
            engine,
            workflow_id,
            step,
            data,
        }
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn step(&self) -> StepName {
        self.step
    }

    /// Data as it was when the context was taken.
    pub fn data(&self) -> &WorkflowData {
        &self.data
    }

    /// Send edited fields for this step. Fails with `NoActiveWorkflow` once
    /// the engine has moved on to another workflow.
    pub async fn on_data_change(&self, partial: WorkflowData) -> Result<ValidationResults> {
        self.engine
            .update_step_in(Some(self.workflow_id), self.step, partial)
            .await
    }

    /// Report the step's own verdict. It overrides the central rules for
    /// this step until replaced. Refused once the workflow has left this
    /// step or been replaced.
    pub async fn on_validation(&self, is_valid: bool, errors: Option<Vec<FieldError>>) -> Result<()> {
        let results = if is_valid {
            ValidationResults::valid()
        } else {
            ValidationResults::invalid(errors.unwrap_or_default())
        };
        self.engine
            .record_validation_in(Some(self.workflow_id), self.step, results)
            .await
    }

    pub async fn on_next(&self) -> Result<TransitionOutcome> {
        self.engine.next_step().await
    }

    pub async fn on_previous(&self) -> Result<TransitionOutcome> {
        self.engine.previous_step().await
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("workflow_id", &self.workflow_id)
            .field("step", &self.step)
            .field("fields", &self.data.len())
            .finish()
    }
}
