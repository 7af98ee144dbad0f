//! AST Module - workflow model parsed from YAML
//!
//! Contains the static, read-only description of a run:
//! - `workflow`: Workflow, Task
//! - `action`: Action, SwitchDirective, SwitchCase
//! - `variable`: Variable, Udf
//!
//! These types represent the "what" - static structure parsed from YAML.
//! For runtime execution, see the `runtime` module.

mod action;
mod variable;
mod workflow;

// Re-export all public types
pub use action::{Action, SwitchCase, SwitchDirective};
pub use variable::{Udf, Variable, VariableSource, VariableTarget};
pub use workflow::{Task, Workflow};
