//! Workflow data model.
//!
//! `WorkflowState` is the backend's record of one workflow, `WorkflowSession`
//! the client-side handle that travels with it, and `ActiveWorkflow` the
//! pair as held by an engine.

mod data;
mod state;
mod types;

pub use data::{is_truthy, DependentReset, WorkflowData};
pub use state::{ActiveWorkflow, StepHistoryEntry};
pub use types::{
    AutoSaveConfig, StepName, WorkflowId, WorkflowSession, WorkflowState, WorkflowStatus,
    WorkflowType, DEFAULT_AUTOSAVE_INTERVAL_SECS,
};
