// SPDX-License-Identifier: MIT

//! Workflow state - the key/value record threaded through a run.
//!
//! Keys are only ever added or overwritten, never deleted. Each node
//! returns a [StateDelta] that the executor merges in; a later write to
//! the same key overwrites, which is what makes loop accumulators
//! (repeated `implementation` rewrites) work.

use crate::adk::error::WorkflowError;
use serde_json::{Map, Value};

/// The set of keys a single node execution wrote
pub type StateDelta = Map<String, Value>;

/// Accumulating key/value state for one run. Owned exclusively by the
/// executor for the duration of the run.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    fields: Map<String, Value>,
}

impl WorkflowState {
    /// Create an empty state
    pub fn empty() -> Self {
        Self { fields: Map::new() }
    }

    /// Create a state from a caller-supplied seed (e.g. `{"task": ...}`)
    pub fn from_seed(seed: StateDelta) -> Self {
        Self { fields: seed }
    }

    /// Merge a node's delta into state; same-key writes overwrite
    pub fn merge(&mut self, delta: &StateDelta) {
        for (key, value) in delta {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested value using dot notation (e.g. `result.score`)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Snapshot the full state as a JSON object
    pub fn snapshot(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// All field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render a prompt template by substituting `{key}` placeholders with
    /// state values. `{{` and `}}` escape literal braces. Referencing a
    /// key absent from state is a template error, fatal to the run.
    pub fn render(&self, template: &str) -> Result<String, WorkflowError> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(k) => key.push(k),
                            None => {
                                return Err(WorkflowError::Template { key });
                            }
                        }
                    }
                    let value = self
                        .get_path(&key)
                        .ok_or_else(|| WorkflowError::Template { key: key.clone() })?;
                    out.push_str(&display_value(value));
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }
}

/// Convert a state value to prompt-ready text
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => arr
            .iter()
            .map(|v| format!("- {}", display_value(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}
