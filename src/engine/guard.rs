//! Navigation guard: which step transitions are currently allowed.

use serde::{Deserialize, Serialize};

use crate::steps::{ValidationResults, Validator};
use crate::workflow::{ActiveWorkflow, StepName};

/// How a step-supplied override combines with the central verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// The override, when present, is the whole verdict.
    #[default]
    Replace,
    /// Central rules and the override must both pass.
    Conjunction,
}

impl std::fmt::Display for OverridePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverridePolicy::Replace => write!(f, "replace"),
            OverridePolicy::Conjunction => write!(f, "conjunction"),
        }
    }
}

/// Borrowed view combining the validator with an override policy.
#[derive(Debug, Clone, Copy)]
pub struct NavigationGuard<'a> {
    validator: &'a Validator,
    policy: OverridePolicy,
}

impl<'a> NavigationGuard<'a> {
    pub fn new(validator: &'a Validator, policy: OverridePolicy) -> Self {
        Self { validator, policy }
    }

    /// Verdict for `step` after applying any override the step reported.
    pub fn effective_validation(&self, active: &ActiveWorkflow, step: StepName) -> ValidationResults {
        match (active.override_for(step), self.policy) {
            (Some(results), OverridePolicy::Replace) => results.clone(),
            (Some(results), OverridePolicy::Conjunction) => self
                .validator
                .validate(step, &active.state().data)
                .and(results.clone()),
            (None, _) => self.validator.validate(step, &active.state().data),
        }
    }

    pub fn can_navigate_next(&self, active: &ActiveWorkflow) -> bool {
        let current = active.current_step();
        self.validator.registry().next(current).is_some()
            && self.effective_validation(active, current).is_valid
    }

    /// Regression is never gated by validation.
    pub fn can_navigate_previous(&self, active: &ActiveWorkflow) -> bool {
        self.validator
            .registry()
            .previous(active.current_step())
            .is_some()
    }

    pub fn can_navigate_to(&self, active: &ActiveWorkflow, target: StepName) -> bool {
        let registry = self.validator.registry();
        let (Some(from), Some(to)) = (
            registry.index_of(active.current_step()),
            registry.index_of(target),
        ) else {
            return false;
        };
        match to.cmp(&from) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => false,
            std::cmp::Ordering::Greater => self.forward_blocker(active, target).is_none(),
        }
    }

    /// First failing verdict among the steps a forward move to `target`
    /// would leave behind, starting with the current one.
    pub fn forward_blocker(&self, active: &ActiveWorkflow, target: StepName) -> Option<ValidationResults> {
        self.validator
            .registry()
            .span(active.current_step(), target)
            .into_iter()
            .map(|step| self.effective_validation(active, step))
            .find(|results| !results.is_valid)
    }
}
