//! Task selector: `*`, a single name, or a comma-separated list

use std::sync::Arc;

use crate::ast::{Task, Workflow};
use crate::error::{Result, RunbookError};

pub const WILDCARD: &str = "*";

/// Tasks to run, in selector order
///
/// The wildcard runs every task in declaration order, except tasks bound
/// as another task's recovery task.
pub fn select_tasks(workflow: &Workflow, selector: &str) -> Result<Vec<Arc<Task>>> {
    let selector = selector.trim();
    if selector.is_empty() || selector == WILDCARD {
        let recovery = workflow.recovery_tasks();
        return Ok(workflow
            .tasks
            .iter()
            .filter(|task| !recovery.contains(task.name.as_str()))
            .cloned()
            .collect());
    }

    selector
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            workflow
                .task(name)
                .cloned()
                .ok_or_else(|| RunbookError::TaskNotFound {
                    workflow: workflow.name.clone(),
                    task: name.to_string(),
                })
        })
        .collect()
}
