//! Workflow engine: state store, navigation, transition lock and autosave.

mod autosave;
mod context;
mod events;
mod guard;
mod lock;
mod store;

pub use autosave::{AutosaveScheduler, DraftSink};
pub use context::StepContext;
pub use events::WorkflowEvent;
pub use guard::{NavigationGuard, OverridePolicy};
pub use lock::{BusyGuard, BusyLock};
pub use store::{
    DraftSave, EngineBuilder, EngineConfig, Progress, TransitionOutcome, WorkflowEngine,
    DEFAULT_BACKEND_TIMEOUT_SECS, DEFAULT_RESUMED_SESSION_TTL_HOURS,
};
