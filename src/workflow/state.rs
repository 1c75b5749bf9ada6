//! Engine-local view of the workflow being driven.
//!
//! `ActiveWorkflow` wraps the backend's `WorkflowState` together with the
//! client-only pieces: the session handle, step-supplied validation
//! overrides, and the history of steps entered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AutoSaveConfig, StepName, WorkflowId, WorkflowSession, WorkflowState};
use crate::steps::{ValidationOverrides, ValidationResults};

/// A record of a step being entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepHistoryEntry {
    /// The step that was entered.
    pub step: StepName,
    /// When this step was entered.
    pub entered_at: DateTime<Utc>,
}

/// The workflow an engine currently owns.
#[derive(Debug, Clone)]
pub struct ActiveWorkflow {
    state: WorkflowState,
    session: WorkflowSession,
    overrides: ValidationOverrides,
    history: Vec<StepHistoryEntry>,
}

impl ActiveWorkflow {
    /// The state's current step is recorded as the first history entry.
    pub fn new(state: WorkflowState, session: WorkflowSession) -> Self {
        let history = vec![StepHistoryEntry {
            step: state.current_step,
            entered_at: state.updated_at,
        }];
        Self {
            state,
            session,
            overrides: ValidationOverrides::default(),
            history,
        }
    }

    pub fn id(&self) -> WorkflowId {
        self.state.id
    }

    pub fn current_step(&self) -> StepName {
        self.state.current_step
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn session(&self) -> &WorkflowSession {
        &self.session
    }

    pub fn auto_save(&self) -> &AutoSaveConfig {
        &self.session.auto_save
    }

    pub fn auto_save_mut(&mut self) -> &mut AutoSaveConfig {
        &mut self.session.auto_save
    }

    pub fn overrides(&self) -> &ValidationOverrides {
        &self.overrides
    }

    /// The override a step reported for itself, if any.
    pub fn override_for(&self, step: StepName) -> Option<&ValidationResults> {
        self.overrides.get(step)
    }

    pub fn record_override(&mut self, step: StepName, results: ValidationResults) {
        self.overrides.set(step, results);
    }

    pub fn clear_override(&mut self, step: StepName) -> Option<ValidationResults> {
        self.overrides.clear(step)
    }

    /// Steps entered so far, in order.
    pub fn history(&self) -> &[StepHistoryEntry] {
        &self.history
    }

    /// Move to `step`, stamping `updated_at` with `now` unless that would
    /// move it backwards.
    pub fn enter_step(&mut self, step: StepName, now: DateTime<Utc>) {
        self.state.current_step = step;
        self.state.updated_at = self.state.updated_at.max(now);
        self.history.push(StepHistoryEntry {
            step,
            entered_at: self.state.updated_at,
        });
    }

    /// Adopt the backend's canonical state.
    ///
    /// A step change made by the backend is appended to the history, and
    /// `updated_at` is kept non-decreasing.
    pub fn replace_state(&mut self, mut state: WorkflowState) {
        state.updated_at = state.updated_at.max(self.state.updated_at);
        if state.current_step != self.state.current_step {
            self.history.push(StepHistoryEntry {
                step: state.current_step,
                entered_at: state.updated_at,
            });
        }
        self.state = state;
    }
}
