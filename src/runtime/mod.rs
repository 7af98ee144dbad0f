//! Runtime Module - execution engine
//!
//! Key types:
//! - `Engine`: workflow catalog, run entry point, consumer boundary
//! - `RunRequest` / `RunResponse`: run contract (sync data or session id)
//! - `select_tasks` / `validate_run`: checks done before a session exists

mod engine;
mod interpreter;
pub mod selector;
pub mod validate;
mod variables;

pub use engine::{Engine, LoggingOptions, RunRequest, RunResponse};
pub use interpreter::{ERROR_KEY, RESPONSE_KEY};
pub use selector::select_tasks;
pub use validate::validate_run;
