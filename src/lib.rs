//! Runbook - declarative workflow engine with session-scoped event streams
//!
//! Architecture (leaves first):
//! - `service`: `namespace.verb` registry and dispatch
//! - `state`: hierarchical scope frames with shift/append and templates
//! - `ast`: Workflow → Task → Action, switch and recovery directives
//! - `runtime`: engine, task selection, validation, interpreter
//! - `session` / `event`: per-run buffers with Start/End pairing
//! - `report`: polling consumer that renders and aggregates use cases

pub mod ast;
pub mod config;
pub mod error;
pub mod event;
pub mod report;
pub mod runtime;
pub mod service;
pub mod session;
pub mod state;
pub mod util;

pub use ast::{Action, SwitchCase, SwitchDirective, Task, Variable, Workflow};
pub use config::RunbookConfig;
pub use error::{ErrorKind, FixSuggestion, Result, RunbookError};
pub use event::{Event, EventKind, Level};
pub use report::{Reporter, ReporterConfig, Summary};
pub use runtime::{Engine, LoggingOptions, RunRequest, RunResponse};
pub use service::{ActionContext, Handler, Registry, ServiceBuilder, ServiceResponse};
pub use session::SessionId;
pub use state::StateStore;
