//! Step catalog and structural validation.

mod registry;
mod validation;

pub use registry::{RuleType, StepConfig, StepRegistry, ValidationRule};
pub use validation::{
    CustomPredicate, FieldError, ValidationOverrides, ValidationResults, Validator,
    CODE_PATTERN_MISMATCH, CODE_REQUIRED, CODE_UNKNOWN_STEP,
};
