//! Variable Types - state assignments attached to workflows, tasks and actions
//!
//! - `from: key.path` copies a value out of the state store
//! - `from: "<-key"` shifts the first element off a sequence
//! - `value: ...` is template-expanded against the current scope
//! - `name: "->key"` appends to a sequence instead of replacing

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, RunbookError};
use crate::util::jsonpath;

const SHIFT_PREFIX: &str = "<-";
const APPEND_PREFIX: &str = "->";

/// A named assignment
#[derive(Debug, Clone, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub udf: Option<Udf>,
    /// Fail instead of skipping when the source has no value
    #[serde(default)]
    pub required: bool,
}

/// Where a variable reads its value from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableSource<'a> {
    Value(&'a Value),
    Path(&'a str),
    Shift(&'a str),
}

/// How a variable writes its value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableTarget<'a> {
    Replace(&'a str),
    Append(&'a str),
}

impl Variable {
    pub fn from_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            from: Some(path.into()),
            udf: None,
            required: false,
        }
    }

    pub fn with_value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            from: None,
            udf: None,
            required: false,
        }
    }

    pub fn source(&self) -> Result<VariableSource<'_>> {
        match (&self.value, self.from.as_deref()) {
            (Some(value), None) => Ok(VariableSource::Value(value)),
            (None, Some(from)) => match from.strip_prefix(SHIFT_PREFIX) {
                Some(key) => Ok(VariableSource::Shift(key.trim())),
                None => Ok(VariableSource::Path(from.trim())),
            },
            (Some(_), Some(_)) => Err(self.invalid("both 'value' and 'from' are set")),
            (None, None) => Err(self.invalid("neither 'value' nor 'from' is set")),
        }
    }

    pub fn target(&self) -> VariableTarget<'_> {
        match self.name.strip_prefix(APPEND_PREFIX) {
            Some(key) => VariableTarget::Append(key.trim()),
            None => VariableTarget::Replace(self.name.trim()),
        }
    }

    /// Shape checks run before any action executes
    pub fn validate(&self) -> Result<()> {
        let key = match self.target() {
            VariableTarget::Replace(key) | VariableTarget::Append(key) => key,
        };
        if key.is_empty() {
            return Err(self.invalid("name is empty"));
        }
        jsonpath::split_root(key).map_err(|e| self.invalid(&e.to_string()))?;

        match self.source()? {
            VariableSource::Path(path) | VariableSource::Shift(path) => {
                if path.is_empty() {
                    return Err(self.invalid("'from' is empty"));
                }
                jsonpath::split_root(path).map_err(|e| self.invalid(&e.to_string()))?;
            }
            VariableSource::Value(_) => {}
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> RunbookError {
        RunbookError::InvalidVariable {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Value conversion functions applied after a variable is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Udf {
    AsInt,
    AsFloat,
    AsString,
    /// Parse a JSON document held in a string
    AsMap,
    Length,
}

impl Udf {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AsInt => "as_int",
            Self::AsFloat => "as_float",
            Self::AsString => "as_string",
            Self::AsMap => "as_map",
            Self::Length => "length",
        }
    }

    pub fn apply(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (Self::AsInt, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::from)
                .ok_or_else(|| self.failed("number out of range")),
            (Self::AsInt, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| self.failed(&e.to_string())),
            (Self::AsInt, Value::Bool(b)) => Ok(Value::from(i64::from(b))),
            (Self::AsFloat, Value::Number(n)) => n
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| self.failed("number out of range")),
            (Self::AsFloat, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| self.failed(&e.to_string())),
            (Self::AsString, Value::String(s)) => Ok(Value::String(s)),
            (Self::AsString, other) => Ok(Value::String(other.to_string())),
            (Self::AsMap, Value::String(s)) => match serde_json::from_str::<Value>(&s) {
                Ok(map @ Value::Object(_)) => Ok(map),
                Ok(_) => Err(self.failed("document is not an object")),
                Err(e) => Err(self.failed(&e.to_string())),
            },
            (Self::AsMap, map @ Value::Object(_)) => Ok(map),
            (Self::Length, Value::Array(items)) => Ok(Value::from(items.len())),
            (Self::Length, Value::Object(map)) => Ok(Value::from(map.len())),
            (Self::Length, Value::String(s)) => Ok(Value::from(s.chars().count())),
            (_, other) => Err(self.failed(&format!("unsupported value {}", other))),
        }
    }

    fn failed(&self, reason: &str) -> RunbookError {
        RunbookError::UdfFailed {
            udf: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}
