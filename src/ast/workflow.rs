//! Workflow Types - main workflow structure
//!
//! Contains the core YAML-parsed types:
//! - `Workflow`: Root workflow with tasks and init/post variables
//! - `Task`: Ordered actions plus control directives (recovery, async)

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::{Result, RunbookError};

use super::action::Action;
use super::variable::Variable;

/// Workflow parsed from YAML (raw)
#[derive(Debug, Deserialize)]
struct WorkflowRaw {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    init: Vec<Variable>,
    #[serde(default)]
    post: Vec<Variable>,
    tasks: Vec<Task>,
}

/// Workflow with Arc-wrapped tasks for efficient cloning
///
/// Immutable once loaded; the engine shares it across concurrent runs.
#[derive(Debug)]
pub struct Workflow {
    pub name: String,
    pub description: Option<String>,
    /// Evaluated into the root frame before the first task
    pub init: Vec<Variable>,
    /// Evaluated against the root frame at the end: the run's published values
    pub post: Vec<Variable>,
    pub tasks: Vec<Arc<Task>>,
}

impl<'de> Deserialize<'de> for Workflow {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = WorkflowRaw::deserialize(deserializer)?;
        Ok(Workflow {
            name: raw.name,
            description: raw.description,
            init: raw.init,
            post: raw.post,
            tasks: raw.tasks.into_iter().map(Arc::new).collect(),
        })
    }
}

impl Workflow {
    /// Parse a workflow from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RunbookError::ParseError {
            details: e.to_string(),
        })
    }

    /// Look up a task by name
    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Names of tasks bound as another task's recovery task
    pub fn recovery_tasks(&self) -> FxHashSet<&str> {
        self.tasks
            .iter()
            .filter_map(|t| t.on_error.as_deref())
            .collect()
    }

    /// Structural checks that need no registry: unique names, recovery bindings
    pub fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RunbookError::InvalidWorkflow {
                workflow: self.name.clone(),
                reason: "name is empty".to_string(),
            });
        }

        let mut seen = FxHashSet::default();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(RunbookError::InvalidWorkflow {
                    workflow: self.name.clone(),
                    reason: "task with empty name".to_string(),
                });
            }
            if !seen.insert(task.name.as_str()) {
                return Err(RunbookError::InvalidWorkflow {
                    workflow: self.name.clone(),
                    reason: format!("duplicate task '{}'", task.name),
                });
            }
        }

        for task in &self.tasks {
            if let Some(recovery) = &task.on_error {
                if recovery == &task.name || self.task(recovery).is_none() {
                    return Err(RunbookError::UnknownRecoveryTask {
                        task: task.name.clone(),
                        recovery: recovery.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// A named, ordered group of actions
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Local to the task frame
    #[serde(default)]
    pub init: Vec<Variable>,
    /// Published into the parent frame when the task succeeds
    #[serde(default)]
    pub post: Vec<Variable>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Task run when an action of this task fails
    #[serde(default)]
    pub on_error: Option<String>,
    /// Dispatch actions concurrently
    #[serde(default, rename = "async")]
    pub is_async: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: recover
tasks:
  - name: fail
    on_error: catch
    actions:
      - action: nop.fail
        request: { message: "this is test error 1" }
  - name: catch
    post:
      - { name: errorCaught, from: error }
    actions:
      - action: nop.nop
"#;

    #[test]
    fn parse_workflow_with_recovery() {
        let workflow = Workflow::from_yaml(YAML).unwrap();
        assert_eq!(workflow.name, "recover");
        assert_eq!(workflow.tasks.len(), 2);
        assert_eq!(workflow.tasks[0].on_error.as_deref(), Some("catch"));
        assert!(!workflow.tasks[0].is_async);
        assert!(workflow.recovery_tasks().contains("catch"));
        workflow.validate_structure().unwrap();
    }

    #[test]
    fn parse_async_flag() {
        let workflow = Workflow::from_yaml(
            r#"
name: a
tasks:
  - name: t
    async: true
    actions: []
"#,
        )
        .unwrap();
        assert!(workflow.tasks[0].is_async);
    }

    #[test]
    fn duplicate_task_is_invalid() {
        let workflow = Workflow::from_yaml(
            r#"
name: dup
tasks:
  - { name: t, actions: [] }
  - { name: t, actions: [] }
"#,
        )
        .unwrap();
        let err = workflow.validate_structure().unwrap_err();
        assert!(err.to_string().contains("duplicate task 't'"));
    }

    #[test]
    fn unknown_recovery_is_invalid() {
        let workflow = Workflow::from_yaml(
            r#"
name: bad
tasks:
  - { name: t, on_error: missing, actions: [] }
"#,
        )
        .unwrap();
        assert!(matches!(
            workflow.validate_structure(),
            Err(RunbookError::UnknownRecoveryTask { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = Workflow::from_yaml("name: [").unwrap_err();
        assert_eq!(err.code(), "RB-001");
    }
}
