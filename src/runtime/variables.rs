//! Variable evaluation against the state store
//!
//! `init` lists are assigned as they are evaluated. `post` lists are
//! evaluated inside the child frame (replacements stay visible to later
//! entries), then replayed into the parent once the child frame is popped.

use serde_json::Value;

use crate::ast::{Variable, VariableSource, VariableTarget};
use crate::error::{Result, RunbookError};
use crate::state::StateStore;

/// A write produced by a variable, applied to whatever frame is innermost
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Assignment {
    Replace(String, Value),
    Append(String, Value),
}

impl Assignment {
    pub fn apply(self, state: &mut StateStore) {
        match self {
            Self::Replace(key, value) => state.put(&key, value),
            Self::Append(key, value) => state.append(&key, value),
        }
    }
}

/// Read a variable's value; `None` when the source has nothing
fn evaluate(state: &mut StateStore, variable: &Variable) -> Result<Option<Value>> {
    let source = variable.source()?;
    let value = match source {
        VariableSource::Value(value) => Some(state.expand(value)),
        VariableSource::Path(path) => state.get(path),
        VariableSource::Shift(path) => state.shift(path),
    };

    let Some(value) = value else {
        if variable.required {
            let source_path = match source {
                VariableSource::Path(path) => path.to_string(),
                VariableSource::Shift(path) => format!("<-{}", path),
                VariableSource::Value(_) => String::new(),
            };
            return Err(RunbookError::VariableMissing {
                name: variable.name.clone(),
                source_path,
            });
        }
        return Ok(None);
    };

    match variable.udf {
        Some(udf) => udf.apply(value).map(Some),
        None => Ok(Some(value)),
    }
}

fn assignment(variable: &Variable, value: Value) -> Assignment {
    match variable.target() {
        VariableTarget::Replace(key) => Assignment::Replace(key.to_string(), value),
        VariableTarget::Append(key) => Assignment::Append(key.to_string(), value),
    }
}

/// Evaluate and assign into the current scope, in order
pub(crate) fn apply_init(state: &mut StateStore, variables: &[Variable]) -> Result<()> {
    for variable in variables {
        if let Some(value) = evaluate(state, variable)? {
            assignment(variable, value).apply(state);
        }
    }
    Ok(())
}

/// Evaluate `post` variables in the current (child) frame
pub(crate) fn collect_post(
    state: &mut StateStore,
    variables: &[Variable],
) -> Result<Vec<Assignment>> {
    let mut writes = Vec::with_capacity(variables.len());
    for variable in variables {
        let Some(value) = evaluate(state, variable)? else {
            continue;
        };
        let write = assignment(variable, value);
        if let Assignment::Replace(key, value) = &write {
            state.put(key, value.clone());
        }
        writes.push(write);
    }
    Ok(writes)
}

pub(crate) fn apply_all(state: &mut StateStore, writes: Vec<Assignment>) {
    for write in writes {
        write.apply(state);
    }
}
