//! Vindex construction parameters.

use crate::error::{VindexError, VindexResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Untyped construction parameters supplied by schema metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VindexParams(Map<String, Value>);

impl VindexParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns a raw parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a required string parameter.
    pub fn require_str(&self, vindex: &str, key: &str) -> VindexResult<&str> {
        match self.0.get(key) {
            None | Some(Value::Null) => Err(VindexError::missing_param(vindex, key)),
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(Value::String(_)) => Err(VindexError::invalid_param(vindex, key, "empty string")),
            Some(other) => Err(VindexError::invalid_param(
                vindex,
                key,
                format!("expected string, got {other}"),
            )),
        }
    }

    /// Returns an optional boolean parameter, defaulting to `default`.
    pub fn bool_or(&self, vindex: &str, key: &str, default: bool) -> VindexResult<bool> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| VindexError::invalid_param(vindex, key, format!("not a bool: {s}"))),
            Some(other) => Err(VindexError::invalid_param(
                vindex,
                key,
                format!("expected bool, got {other}"),
            )),
        }
    }

    /// Returns true if no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
