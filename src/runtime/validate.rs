//! Pre-run validation
//!
//! Runs before a session exists, so a rejected request leaves no trace:
//! structure, variables, switch directives and every reachable action id
//! (selected tasks, their recovery tasks, all switch branches).

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::ast::{Action, Task, Variable, Workflow};
use crate::error::{Result, RunbookError};
use crate::service::Registry;

pub fn validate_run(workflow: &Workflow, tasks: &[Arc<Task>], registry: &Registry) -> Result<()> {
    workflow.validate_structure()?;
    validate_variables(&workflow.init)?;
    validate_variables(&workflow.post)?;

    let mut seen = FxHashSet::default();
    let mut pending: Vec<&Task> = tasks.iter().map(Arc::as_ref).collect();
    while let Some(task) = pending.pop() {
        if !seen.insert(task.name.as_str()) {
            continue;
        }
        validate_task(workflow, task, registry)?;
        if let Some(recovery) = task.on_error.as_deref().and_then(|name| workflow.task(name)) {
            pending.push(recovery);
        }
    }
    Ok(())
}

fn validate_task(workflow: &Workflow, task: &Task, registry: &Registry) -> Result<()> {
    validate_variables(&task.init)?;
    validate_variables(&task.post)?;
    let location = format!("{}.{}", workflow.name, task.name);
    for action in &task.actions {
        validate_action(action, &location, registry)?;
    }
    Ok(())
}

fn validate_action(action: &Action, location: &str, registry: &Registry) -> Result<()> {
    validate_variables(&action.init)?;
    validate_variables(&action.post)?;

    match &action.switch {
        Some(directive) => {
            directive.validate()?;
            for case in &directive.cases {
                validate_action(&case.action, location, registry)?;
            }
            if let Some(default) = &directive.default {
                validate_action(default, location, registry)?;
            }
            Ok(())
        }
        None if action.action.trim().is_empty() => Err(RunbookError::InvalidActionId {
            id: action.action.clone(),
        }),
        None => registry.resolve(&action.action, location).map(|_| ()),
    }
}

fn validate_variables(variables: &[Variable]) -> Result<()> {
    variables.iter().try_for_each(Variable::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::selector::select_tasks;

    fn check(yaml: &str) -> Result<()> {
        let workflow = Workflow::from_yaml(yaml).unwrap();
        let registry = Registry::with_builtins().unwrap();
        let tasks = select_tasks(&workflow, "*")?;
        validate_run(&workflow, &tasks, &registry)
    }

    #[test]
    fn test_valid_workflow() {
        check(
            r#"
name: ok
tasks:
  - name: run
    actions:
      - action: nop.parrot
        request: { in: 1 }
"#,
        )
        .unwrap();
    }

    #[test]
    fn test_unknown_verb_in_recovery_task() {
        let err = check(
            r#"
name: workflow
tasks:
  - { name: main, on_error: run, actions: [ { action: nop.nop } ] }
  - { name: run, actions: [ { action: nop.aaa } ] }
"#,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("unknown nop.aaa service action at workflow.run"));
    }

    #[test]
    fn test_unknown_service_in_switch_branch() {
        let err = check(
            r#"
name: sw
tasks:
  - name: run
    actions:
      - switch:
          key: k
          cases:
            - { value: a, action: { action: nop.nop } }
          default: { action: aaa.bbb }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to lookup service: 'aaa'"));
    }

    #[test]
    fn test_empty_action_id() {
        let err = check("name: e\ntasks:\n  - { name: t, actions: [ { description: x } ] }\n")
            .unwrap_err();
        assert_eq!(err.code(), "RB-022");
    }

    #[test]
    fn test_invalid_switch_and_variable() {
        let err = check(
            r#"
name: sw
tasks:
  - name: t
    actions:
      - switch: { key: "", cases: [ { value: a, action: { action: nop.nop } } ] }
"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "RB-040");

        let err = check(
            r#"
name: v
init: [ { name: a } ]
tasks: []
"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "RB-041");
    }
}
