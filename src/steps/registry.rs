//! Ordered catalog of step definitions.

use serde::Serialize;
use serde_json::json;

use crate::workflow::{DependentReset, StepName};
use crate::{Error, Result};

/// Kind of check a rule asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Field must be present and not falsy.
    Required,
    /// Field's string value must match `pattern`.
    Pattern,
    /// Checked by a predicate registered under `code`, or by the step UI.
    Custom,
}

/// One declarative rule on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRule {
    pub field: String,
    pub rule_type: RuleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Predicate key for `Custom` rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl ValidationRule {
    pub fn required(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            rule_type: RuleType::Required,
            pattern: None,
            code: None,
            message: message.to_string(),
        }
    }

    pub fn pattern(field: &str, pattern: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            rule_type: RuleType::Pattern,
            pattern: Some(pattern.to_string()),
            code: None,
            message: message.to_string(),
        }
    }

    pub fn custom(field: &str, code: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            rule_type: RuleType::Custom,
            pattern: None,
            code: Some(code.to_string()),
            message: message.to_string(),
        }
    }
}

/// Immutable definition of a single step.
#[derive(Debug, Clone, Serialize)]
pub struct StepConfig {
    pub name: StepName,
    pub title: String,
    pub description: String,
    pub rules: Vec<ValidationRule>,
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    #[serde(skip)]
    pub resets: Vec<DependentReset>,
}

impl StepConfig {
    pub fn new(name: StepName, title: &str, description: &str) -> Self {
        Self {
            name,
            title: title.to_string(),
            description: description.to_string(),
            rules: Vec::new(),
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            resets: Vec::new(),
        }
    }

    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn optional(mut self, fields: &[&str]) -> Self {
        self.optional_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn reset(mut self, reset: DependentReset) -> Self {
        self.resets.push(reset);
        self
    }

    /// Every field this step knows about.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.required_fields
            .iter()
            .chain(self.optional_fields.iter())
            .map(String::as_str)
    }
}

/// Ordered step catalog. Position in the list is navigation order.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct StepRegistry {
    steps: Vec<StepConfig>,
}

impl StepRegistry {
    /// Build a registry, rejecting an empty list or a step listed twice.
    pub fn new(steps: Vec<StepConfig>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::Validation("step registry is empty".to_string()));
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.name == step.name) {
                return Err(Error::Validation(format!(
                    "step {} registered twice",
                    step.name
                )));
            }
        }
        Ok(Self { steps })
    }

    /// The six-step asset creation sequence.
    pub fn asset_creation() -> Self {
        let steps = vec![
            StepConfig::new(
                StepName::BasicInfo,
                "Basic Information",
                "Choose the asset type and give the asset a name",
            )
            .required(&["asset_type", "asset_name"])
            .optional(&["description", "tags"])
            .rule(ValidationRule::required("asset_type", "Asset type is required"))
            .rule(ValidationRule::required("asset_name", "Asset name is required"))
            .rule(ValidationRule::pattern(
                "asset_type",
                "^(Device|Software|Network|Facility|Document)$",
                "Unknown asset type",
            ))
            .rule(ValidationRule::pattern(
                "asset_name",
                r"^[A-Za-z0-9][A-Za-z0-9 _.\-]{0,99}$",
                "Asset name must start with a letter or digit and use only letters, digits, spaces, '_', '.' or '-' (max 100)",
            )),
            StepConfig::new(
                StepName::Hierarchy,
                "Hierarchy",
                "Place the asset under a parent asset",
            )
            .optional(&["parent_id", "location"])
            .rule(ValidationRule::custom(
                "parent_id",
                "DEVICE_REQUIRES_PARENT",
                "Devices must be placed under a parent asset",
            )),
            StepConfig::new(
                StepName::Metadata,
                "Metadata",
                "Select a metadata schema and fill in its fields",
            )
            .required(&["metadata_schema_id"])
            .optional(&["metadata"])
            .rule(ValidationRule::required(
                "metadata_schema_id",
                "A metadata schema must be selected",
            ))
            .reset(DependentReset::new("metadata_schema_id", "metadata", json!({}))),
            StepConfig::new(
                StepName::Security,
                "Security",
                "Classify the asset and restrict access",
            )
            .required(&["security_level"])
            .optional(&["access_groups", "encryption_enabled"])
            .rule(ValidationRule::required(
                "security_level",
                "A security level is required",
            ))
            .rule(ValidationRule::pattern(
                "security_level",
                "^(public|internal|confidential|restricted)$",
                "Security level must be public, internal, confidential or restricted",
            )),
            StepConfig::new(
                StepName::Files,
                "Files",
                "Attach documents and firmware images",
            )
            .optional(&["files", "firmware_analysis"])
            .rule(ValidationRule::custom(
                "firmware_analysis",
                "FIRMWARE_REQUIRES_FILE",
                "Firmware analysis needs at least one attached file",
            )),
            StepConfig::new(
                StepName::Review,
                "Review",
                "Confirm the collected details and create the asset",
            )
            .required(&["confirmed"])
            .rule(ValidationRule::required(
                "confirmed",
                "Please confirm the details before creating the asset",
            )),
        ];
        Self { steps }
    }

    pub fn steps(&self) -> &[StepConfig] {
        &self.steps
    }

    pub fn order(&self) -> Vec<StepName> {
        self.steps.iter().map(|s| s.name).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, step: StepName) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.name == step)
    }

    /// Like `get`, but an unregistered step is an error.
    pub fn config(&self, step: StepName) -> Result<&StepConfig> {
        self.get(step)
            .ok_or_else(|| Error::UnknownStep(step.to_string()))
    }

    pub fn contains(&self, step: StepName) -> bool {
        self.get(step).is_some()
    }

    pub fn index_of(&self, step: StepName) -> Option<usize> {
        self.steps.iter().position(|s| s.name == step)
    }

    pub fn first(&self) -> StepName {
        self.steps[0].name
    }

    pub fn last(&self) -> StepName {
        self.steps[self.steps.len() - 1].name
    }

    pub fn next(&self, step: StepName) -> Option<StepName> {
        let i = self.index_of(step)?;
        self.steps.get(i + 1).map(|s| s.name)
    }

    pub fn previous(&self, step: StepName) -> Option<StepName> {
        let i = self.index_of(step)?;
        i.checked_sub(1).map(|p| self.steps[p].name)
    }

    /// Steps from `from` (inclusive) up to `to` (exclusive), in order.
    /// Empty unless `to` comes after `from`.
    pub fn span(&self, from: StepName, to: StepName) -> Vec<StepName> {
        match (self.index_of(from), self.index_of(to)) {
            (Some(a), Some(b)) if a < b => self.steps[a..b].iter().map(|s| s.name).collect(),
            _ => Vec::new(),
        }
    }

    /// Every dependent reset declared by any step.
    pub fn resets(&self) -> Vec<DependentReset> {
        self.steps
            .iter()
            .flat_map(|s| s.resets.iter().cloned())
            .collect()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::asset_creation()
    }
}
