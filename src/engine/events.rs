//! Lifecycle notifications for UI layers.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::workflow::{StepName, WorkflowId};

/// Events emitted by the engine as a workflow moves through its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// A new workflow was created by the backend.
    Started { workflow_id: WorkflowId, step: StepName },
    /// An existing workflow was picked up again.
    Resumed { workflow_id: WorkflowId, step: StepName },
    /// Step data was accepted by the backend.
    StepUpdated {
        workflow_id: WorkflowId,
        step: StepName,
        is_valid: bool,
    },
    /// The current step changed.
    StepChanged {
        workflow_id: WorkflowId,
        from: StepName,
        to: StepName,
    },
    /// A draft snapshot was persisted.
    DraftSaved {
        workflow_id: WorkflowId,
        at: DateTime<Utc>,
    },
    /// A draft save was dropped because another was in flight.
    DraftSkipped { workflow_id: WorkflowId },
    /// A draft save failed; autosave keeps running.
    DraftFailed {
        workflow_id: WorkflowId,
        error: String,
    },
    /// The backend created the asset.
    Completed {
        workflow_id: WorkflowId,
        entity_id: String,
    },
    /// The workflow was abandoned.
    Cancelled { workflow_id: WorkflowId },
    /// Local state was discarded without a backend call.
    Reset,
    /// A backend call failed.
    OperationFailed {
        operation: &'static str,
        error: String,
    },
}

/// Optional event channel; sends never fail the caller.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::UnboundedSender<WorkflowEvent>>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
