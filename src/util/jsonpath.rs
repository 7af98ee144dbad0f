//! Dotted paths into JSON values
//!
//! Supports:
//! - a.b.c (dot notation)
//! - a[0].b (array index)
//! - a.0.b (numeric segment as index)
//!
//! The first segment of a state path names a state key; the rest walks the
//! value stored under it.

use serde_json::Value;

use crate::error::RunbookError;

/// A parsed path segment
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Object field access: .field
    Field(String),
    /// Array index access: [0]
    Index(usize),
}

fn unsupported(path: &str) -> RunbookError {
    RunbookError::InvalidRequest {
        reason: format!("unsupported path '{}' (use a.b or a[0].b)", path),
    }
}

/// Parse a path string into segments
///
/// Examples:
/// - "price.currency" → [Field("price"), Field("currency")]
/// - "items[0].name" → [Field("items"), Index(0), Field("name")]
pub fn parse(path: &str) -> Result<Vec<Segment>, RunbookError> {
    if path.is_empty() {
        return Ok(vec![]);
    }

    let mut segments = Vec::new();

    for part in path.split('.') {
        if part.is_empty() {
            return Err(unsupported(path));
        }

        if let Some(bracket_pos) = part.find('[') {
            let field = &part[..bracket_pos];
            if !field.is_empty() {
                segments.push(Segment::Field(field.to_string()));
            }

            // One or more [n] suffixes
            let mut rest = &part[bracket_pos..];
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| unsupported(path))?;
                if !rest.starts_with('[') {
                    return Err(unsupported(path));
                }
                let index: usize = rest[1..close].parse().map_err(|_| unsupported(path))?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
            }
        } else if let Ok(index) = part.parse::<usize>() {
            segments.push(Segment::Index(index));
        } else {
            segments.push(Segment::Field(part.to_string()));
        }
    }

    Ok(segments)
}

/// Apply segments to a JSON value by reference
pub fn apply<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;

    for segment in segments {
        current = match segment {
            Segment::Field(name) => current.get(name.as_str())?,
            Segment::Index(idx) => current.get(*idx)?,
        };
    }

    Some(current)
}

/// Mutable counterpart of [`apply`]
pub fn apply_mut<'a>(value: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    let mut current = value;

    for segment in segments {
        current = match segment {
            Segment::Field(name) => current.get_mut(name.as_str())?,
            Segment::Index(idx) => current.get_mut(*idx)?,
        };
    }

    Some(current)
}

/// Parse and apply in one step (clones the matched value)
pub fn resolve(value: &Value, path: &str) -> Result<Option<Value>, RunbookError> {
    let segments = parse(path)?;
    Ok(apply(value, &segments).cloned())
}

/// Split a state path into its root key and the remaining segments
pub fn split_root(path: &str) -> Result<(String, Vec<Segment>), RunbookError> {
    let mut segments = parse(path)?.into_iter();
    match segments.next() {
        Some(Segment::Field(root)) => Ok((root, segments.collect())),
        _ => Err(unsupported(path)),
    }
}
