pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod steps;
pub mod util;
pub mod workflow;

pub use backend::{FileBackend, InMemoryBackend, WorkflowBackend};
pub use engine::{
    EngineConfig, OverridePolicy, StepContext, TransitionOutcome, WorkflowEngine, WorkflowEvent,
};
pub use error::{Error, Result};
pub use steps::{FieldError, StepRegistry, ValidationResults, Validator};
pub use workflow::{StepName, WorkflowData, WorkflowId, WorkflowState, WorkflowStatus};
