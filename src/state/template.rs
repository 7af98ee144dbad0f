//! Template Resolution - `${path}` and `$name` substitution
//!
//! - A string that is exactly one placeholder resolves to the typed value
//! - Embedded placeholders are replaced by the value's string form
//! - Unresolved placeholders are left verbatim
//!
//! Returns Cow::Borrowed when a string has no placeholder (zero allocation).

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Pre-compiled regex for `${a.b[0]}` or `$name`
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*([^}\s]+)\s*\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// String form used when a value is embedded in text or compared by a switch
pub fn value_to_string(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn path_of<'t>(cap: &regex::Captures<'t>) -> Option<&'t str> {
    cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str())
}

/// Expand a single string
pub fn expand_str<F>(template: &str, lookup: &F) -> Value
where
    F: Fn(&str) -> Option<Value>,
{
    if !template.contains('$') {
        return Value::String(template.to_string());
    }

    // Whole-string placeholder keeps the value's type
    if let Some(cap) = PLACEHOLDER_RE.captures(template) {
        if let (Some(whole), Some(path)) = (cap.get(0), path_of(&cap)) {
            if whole.start() == 0 && whole.end() == template.len() {
                return lookup(path).unwrap_or_else(|| Value::String(template.to_string()));
            }
        }
    }

    Value::String(expand_text(template, lookup).into_owned())
}

/// Replace placeholders inside text, stringifying resolved values
pub fn expand_text<'a, F>(template: &'a str, lookup: &F) -> Cow<'a, str>
where
    F: Fn(&str) -> Option<Value>,
{
    if !template.contains('$') {
        return Cow::Borrowed(template);
    }

    let mut result = String::with_capacity(template.len() + 32);
    let mut last_end = 0;
    let mut replaced = false;

    for cap in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(path)) = (cap.get(0), path_of(&cap)) else {
            continue;
        };
        result.push_str(&template[last_end..whole.start()]);
        match lookup(path) {
            Some(value) => {
                result.push_str(&value_to_string(&value));
                replaced = true;
            }
            None => result.push_str(whole.as_str()),
        }
        last_end = whole.end();
    }

    if !replaced {
        return Cow::Borrowed(template);
    }
    result.push_str(&template[last_end..]);
    Cow::Owned(result)
}

/// Expand every string inside a JSON value (object keys are kept as-is)
pub fn expand<F>(value: &Value, lookup: &F) -> Value
where
    F: Fn(&str) -> Option<Value>,
{
    match value {
        Value::String(s) => expand_str(s, lookup),
        Value::Array(items) => Value::Array(items.iter().map(|v| expand(v, lookup)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand(v, lookup)))
                .collect(),
        ),
        other => other.clone(),
    }
}
