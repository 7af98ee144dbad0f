//! Action Types - a single service call and its switch directive
//!
//! An action targets a `namespace.verb` service identifier. A switch
//! directive replaces the action with one of its cases at run time.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, RunbookError};

use super::variable::Variable;

/// One step of a task
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Action {
    /// Service identifier, `namespace.verb`
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Opens a new use case in the consumer's report
    #[serde(default)]
    pub use_case: Option<String>,
    /// Request payload, template-expanded before dispatch
    #[serde(default)]
    pub request: Value,
    /// Local to the action frame
    #[serde(default)]
    pub init: Vec<Variable>,
    /// Published into the task frame after a successful dispatch
    #[serde(default)]
    pub post: Vec<Variable>,
    #[serde(default)]
    pub switch: Option<SwitchDirective>,
}

impl Action {
    /// Build a plain call action (used by tests and programmatic workflows)
    pub fn call(id: impl Into<String>, request: Value) -> Self {
        Self {
            action: id.into(),
            request,
            ..Self::default()
        }
    }

    /// Attach post variables
    pub fn with_post(mut self, post: Vec<Variable>) -> Self {
        self.post = post;
        self
    }

    /// Build an action whose behaviour is decided by a switch
    pub fn switch(directive: SwitchDirective) -> Self {
        Self {
            switch: Some(directive),
            ..Self::default()
        }
    }
}

/// A case of a switch directive
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchCase {
    #[serde(default)]
    pub value: String,
    pub action: Box<Action>,
}

/// Branch-on-value directive
///
/// Reads `key` from the current scope and runs the action of the first
/// case whose `value` equals it, else `default`, else nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchDirective {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub default: Option<Box<Action>>,
}

impl SwitchDirective {
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(RunbookError::InvalidSwitch {
                reason: "lookup key is empty".to_string(),
            });
        }
        if self.cases.is_empty() && self.default.is_none() {
            return Err(RunbookError::InvalidSwitch {
                reason: format!("switch on '{}' has no cases and no default", self.key),
            });
        }
        if let Some(position) = self.cases.iter().position(|c| c.value.is_empty()) {
            return Err(RunbookError::InvalidSwitch {
                reason: format!("case #{} on '{}' has an empty value", position + 1, self.key),
            });
        }
        Ok(())
    }

    /// Select the action for a looked-up value
    pub fn select(&self, value: &str) -> Option<&Action> {
        self.cases
            .iter()
            .find(|case| case.value == value)
            .map(|case| case.action.as_ref())
            .or(self.default.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parrot(r: &str) -> Box<Action> {
        Box::new(Action::call("nop.parrot", json!({"in": {"r": r}})))
    }

    fn directive() -> SwitchDirective {
        SwitchDirective {
            key: "run".into(),
            cases: vec![
                SwitchCase {
                    value: "action1".into(),
                    action: parrot("test 1"),
                },
                SwitchCase {
                    value: "action2".into(),
                    action: parrot("test 2"),
                },
            ],
            default: Some(parrot("test 3")),
        }
    }

    #[test]
    fn select_first_matching_case() {
        let sw = directive();
        assert_eq!(sw.select("action1").unwrap().request["in"]["r"], "test 1");
        assert_eq!(sw.select("action2").unwrap().request["in"]["r"], "test 2");
    }

    #[test]
    fn select_falls_back_to_default() {
        let sw = directive();
        assert_eq!(sw.select("unknown").unwrap().request["in"]["r"], "test 3");
    }

    #[test]
    fn select_without_default_is_none() {
        let mut sw = directive();
        sw.default = None;
        assert!(sw.select("unknown").is_none());
    }

    #[test]
    fn select_prefers_first_of_duplicate_values() {
        let mut sw = directive();
        sw.cases[1].value = "action1".into();
        assert_eq!(sw.select("action1").unwrap().request["in"]["r"], "test 1");
    }

    #[test]
    fn validate_rules() {
        assert!(SwitchDirective::default().validate().is_err());

        let key_only = SwitchDirective {
            key: "abc".into(),
            ..Default::default()
        };
        assert!(key_only.validate().is_err());

        let empty_case = SwitchDirective {
            key: "abc".into(),
            cases: vec![SwitchCase {
                value: String::new(),
                action: parrot("x"),
            }],
            default: None,
        };
        assert!(empty_case.validate().is_err());

        let ok = SwitchDirective {
            key: "abc".into(),
            cases: vec![SwitchCase {
                value: "123".into(),
                action: parrot("x"),
            }],
            default: None,
        };
        assert!(ok.validate().is_ok());

        let no_key = SwitchDirective {
            key: String::new(),
            ..ok.clone()
        };
        assert!(no_key.validate().is_err());

        let default_only = SwitchDirective {
            key: "abc".into(),
            cases: vec![],
            default: Some(parrot("x")),
        };
        assert!(default_only.validate().is_ok());
    }

    #[test]
    fn parse_switch_from_yaml() {
        let action: Action = serde_yaml::from_str(
            r#"
switch:
  key: run
  cases:
    - value: action1
      action: { action: nop.parrot, request: { in: { r: one } } }
  default: { action: nop.nop }
"#,
        )
        .unwrap();
        let sw = action.switch.unwrap();
        assert_eq!(sw.key, "run");
        assert_eq!(sw.cases.len(), 1);
        assert_eq!(sw.default.unwrap().action, "nop.nop");
    }
}
