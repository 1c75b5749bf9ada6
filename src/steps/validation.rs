//! Structural validation of step data.
//!
//! The `Validator` checks required fields, pattern rules and any custom
//! rule whose code has a registered predicate. Custom rules without a
//! predicate are left to the step UI, which reports its verdict through
//! `ValidationOverrides`.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RuleType, StepConfig, StepRegistry};
use crate::workflow::{StepName, WorkflowData};
use crate::Result;

pub const CODE_REQUIRED: &str = "REQUIRED";
pub const CODE_PATTERN_MISMATCH: &str = "PATTERN_MISMATCH";
pub const CODE_UNKNOWN_STEP: &str = "UNKNOWN_STEP";

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str, code: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
            code: code.to_string(),
        }
    }
}

/// Verdict for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResults {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<FieldError>,
    #[serde(default)]
    pub warnings: Vec<FieldError>,
}

impl ValidationResults {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<FieldError>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings: Vec::new(),
        }
    }

    /// Valid exactly when `errors` is empty.
    pub fn from_errors(errors: Vec<FieldError>, warnings: Vec<FieldError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Both verdicts must pass; errors and warnings are concatenated.
    pub fn and(mut self, other: ValidationResults) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self
    }

    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `field: message` pairs joined with `; `.
    pub fn summary(&self) -> String {
        if self.errors.is_empty() && !self.is_valid {
            return "step is invalid".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for ValidationResults {
    fn default() -> Self {
        Self::valid()
    }
}

/// Step-supplied verdicts, keyed by step.
///
/// An override replaces whatever it previously held for that step; it is
/// never merged field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationOverrides(HashMap<StepName, ValidationResults>);

impl ValidationOverrides {
    pub fn get(&self, step: StepName) -> Option<&ValidationResults> {
        self.0.get(&step)
    }

    pub fn set(&mut self, step: StepName, results: ValidationResults) {
        self.0.insert(step, results);
    }

    pub fn clear(&mut self, step: StepName) -> Option<ValidationResults> {
        self.0.remove(&step)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Predicate for a `Custom` rule; returns true when the data passes.
pub type CustomPredicate = Arc<dyn Fn(&WorkflowData) -> bool + Send + Sync>;

/// A pattern rule with its regex compiled.
#[derive(Debug, Clone)]
struct CompiledPattern {
    field: String,
    regex: Regex,
    message: String,
}

/// A custom rule as declared by the registry.
#[derive(Debug, Clone)]
struct CustomRule {
    field: String,
    code: String,
    message: String,
}

/// Everything needed to validate one step, built once per registry entry.
#[derive(Debug, Clone)]
struct CompiledStep {
    required: Vec<(String, String)>,
    patterns: Vec<CompiledPattern>,
    custom: Vec<CustomRule>,
}

impl CompiledStep {
    fn compile(config: &StepConfig) -> Result<Self> {
        let mut required: Vec<(String, String)> = config
            .required_fields
            .iter()
            .map(|field| {
                let message = config
                    .rules
                    .iter()
                    .find(|r| r.rule_type == RuleType::Required && &r.field == field)
                    .map(|r| r.message.clone())
                    .unwrap_or_else(|| format!("{} is required", field));
                (field.clone(), message)
            })
            .collect();
        let mut patterns = Vec::new();
        let mut custom = Vec::new();

        for rule in &config.rules {
            match rule.rule_type {
                RuleType::Required => {
                    if !required.iter().any(|(f, _)| f == &rule.field) {
                        required.push((rule.field.clone(), rule.message.clone()));
                    }
                }
                RuleType::Pattern => {
                    if let Some(pattern) = &rule.pattern {
                        patterns.push(CompiledPattern {
                            field: rule.field.clone(),
                            regex: Regex::new(pattern)?,
                            message: rule.message.clone(),
                        });
                    }
                }
                RuleType::Custom => custom.push(CustomRule {
                    field: rule.field.clone(),
                    code: rule.code.clone().unwrap_or_default(),
                    message: rule.message.clone(),
                }),
            }
        }

        Ok(Self {
            required,
            patterns,
            custom,
        })
    }

    fn validate(
        &self,
        data: &WorkflowData,
        predicates: &HashMap<String, CustomPredicate>,
    ) -> ValidationResults {
        let mut errors = Vec::new();

        for (field, message) in &self.required {
            if !data.is_present(field) {
                errors.push(FieldError::new(field, message, CODE_REQUIRED));
            }
        }

        for pattern in &self.patterns {
            let Some(text) = data.get(&pattern.field).and_then(pattern_text) else {
                continue;
            };
            if !pattern.regex.is_match(&text) {
                errors.push(FieldError::new(
                    &pattern.field,
                    &pattern.message,
                    CODE_PATTERN_MISMATCH,
                ));
            }
        }

        for rule in &self.custom {
            // No predicate: the step UI owns this rule.
            if let Some(predicate) = predicates.get(&rule.code) {
                if !predicate(data) {
                    errors.push(FieldError::new(&rule.field, &rule.message, &rule.code));
                }
            }
        }

        ValidationResults::from_errors(errors, Vec::new())
    }
}

/// String form of a value for pattern matching; absent-ish values skip the rule.
fn pattern_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Pure, deterministic validator over a `StepRegistry`.
#[derive(Clone)]
pub struct Validator {
    registry: Arc<StepRegistry>,
    compiled: HashMap<StepName, CompiledStep>,
    predicates: HashMap<String, CustomPredicate>,
}

impl Validator {
    /// Compile every step's rules.
    ///
    /// # Errors
    /// Returns `Error::InvalidPattern` if a pattern rule does not compile.
    pub fn new(registry: Arc<StepRegistry>) -> Result<Self> {
        let compiled = registry
            .steps()
            .iter()
            .map(|config| -> Result<(StepName, CompiledStep)> {
                Ok((config.name, CompiledStep::compile(config)?))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self {
            registry,
            compiled,
            predicates: HashMap::new(),
        })
    }

    /// Register the predicate that evaluates custom rules tagged `code`.
    pub fn with_custom<F>(mut self, code: &str, predicate: F) -> Self
    where
        F: Fn(&WorkflowData) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(code.to_string(), Arc::new(predicate));
        self
    }

    /// Register the predicates for the asset creation custom rules.
    pub fn with_asset_rules(self) -> Self {
        self.with_custom("DEVICE_REQUIRES_PARENT", |data| {
            data.get_str("asset_type") != Some("Device") || data.is_present("parent_id")
        })
        .with_custom("FIRMWARE_REQUIRES_FILE", |data| {
            !data.is_present("firmware_analysis") || data.is_present("files")
        })
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn has_predicate(&self, code: &str) -> bool {
        self.predicates.contains_key(code)
    }

    /// Validate `step` against the accumulated `data`.
    ///
    /// A step missing from the registry is reported as invalid rather than
    /// panicking.
    pub fn validate(&self, step: StepName, data: &WorkflowData) -> ValidationResults {
        match self.compiled.get(&step) {
            Some(compiled) => compiled.validate(data, &self.predicates),
            None => ValidationResults::invalid(vec![FieldError::new(
                "step",
                &format!("{} is not part of this workflow", step),
                CODE_UNKNOWN_STEP,
            )]),
        }
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("steps", &self.registry.order())
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}
