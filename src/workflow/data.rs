//! Accumulated domain fields contributed by the steps of a workflow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Declares that changing `gate` invalidates the structure stored under
/// `dependent`, which is reset to `empty` in the same merge.
#[derive(Debug, Clone, PartialEq)]
pub struct DependentReset {
    pub gate: &'static str,
    pub dependent: &'static str,
    pub empty: Value,
}

impl DependentReset {
    pub fn new(gate: &'static str, dependent: &'static str, empty: Value) -> Self {
        Self {
            gate,
            dependent,
            empty,
        }
    }
}

/// Key/value bag of domain fields. Holds no validation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowData(Map<String, Value>);

impl WorkflowData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value, which must be an object (or null for empty).
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(Error::Validation(format!(
                "workflow data must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The field as a string slice, if it holds a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// True when the field exists and is not falsy.
    pub fn is_present(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(is_truthy)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Merge `partial` into this bag.
    ///
    /// For every reset whose gate appears in `partial` with a value different
    /// from the stored one, the dependent field is first reset to its empty
    /// form. Fields in `partial` are applied afterwards, so a partial that
    /// carries both the gate and a fresh dependent value keeps the fresh value.
    /// Returns the dependents that were reset.
    pub fn merge(&mut self, partial: &WorkflowData, resets: &[DependentReset]) -> Vec<&'static str> {
        let mut reset = Vec::new();
        for rule in resets {
            let Some(new_gate) = partial.get(rule.gate) else {
                continue;
            };
            if self.0.get(rule.gate) != Some(new_gate) && self.0.contains_key(rule.gate) {
                self.0.insert(rule.dependent.to_string(), rule.empty.clone());
                reset.push(rule.dependent);
            }
        }
        for (key, value) in &partial.0 {
            self.0.insert(key.clone(), value.clone());
        }
        reset
    }

    /// Copy of this bag with `partial` merged in.
    pub fn merged(&self, partial: &WorkflowData, resets: &[DependentReset]) -> WorkflowData {
        let mut next = self.clone();
        next.merge(partial, resets);
        next
    }
}

impl From<Map<String, Value>> for WorkflowData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for WorkflowData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Falsy values: null, false, blank strings, zero and empty arrays.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}
