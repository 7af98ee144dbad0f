// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Runbook Error Types with Error Codes
//!
//! Error code ranges:
//! - RB-000-009: Workflow / run request errors
//! - RB-010-019: Task selection and recovery binding errors
//! - RB-020-029: Service registry errors
//! - RB-030-039: Dispatch errors
//! - RB-040-049: Switch / variable errors
//! - RB-050-059: Fatal run errors
//! - RB-060-069: Session errors
//! - RB-070-079: Config / IO errors

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RunbookError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Error taxonomy used by the engine to decide propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request or workflow, detected before anything executes
    Validation,
    /// A resolved service returned an error
    Dispatch,
    /// The run must stop regardless of recovery bindings
    Fatal,
    /// Session lookup failures at the consumer boundary
    Session,
    /// Config and filesystem failures
    Io,
}

#[derive(Error, Debug, Diagnostic)]
pub enum RunbookError {
    // ═══════════════════════════════════════════
    // WORKFLOW / REQUEST ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[RB-001] Failed to parse workflow: {details}")]
    #[diagnostic(
        code(runbook::parse_error),
        help("Check YAML syntax: indentation and quoting")
    )]
    ParseError { details: String },

    #[error("[RB-002] failed to load workflow: '{name}' is not registered")]
    #[diagnostic(code(runbook::workflow_not_found))]
    WorkflowNotFound { name: String },

    #[error("[RB-003] Invalid run request: {reason}")]
    #[diagnostic(code(runbook::invalid_request))]
    InvalidRequest { reason: String },

    #[error("[RB-004] Workflow '{workflow}' is invalid: {reason}")]
    #[diagnostic(code(runbook::invalid_workflow))]
    InvalidWorkflow { workflow: String, reason: String },

    // ═══════════════════════════════════════════
    // TASK ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[RB-010] Task '{task}' not found in workflow '{workflow}'")]
    #[diagnostic(code(runbook::task_not_found))]
    TaskNotFound { workflow: String, task: String },

    #[error("[RB-011] Task '{task}' binds unknown recovery task '{recovery}'")]
    #[diagnostic(code(runbook::unknown_recovery))]
    UnknownRecoveryTask { task: String, recovery: String },

    // ═══════════════════════════════════════════
    // REGISTRY ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[RB-020] failed to lookup service: '{service}'")]
    #[diagnostic(code(runbook::unknown_service))]
    UnknownService { service: String },

    #[error("[RB-021] unknown {service}.{action} service action at {location}")]
    #[diagnostic(code(runbook::unknown_action))]
    UnknownAction {
        service: String,
        action: String,
        location: String,
    },

    #[error("[RB-022] Invalid action id '{id}': expected 'namespace.verb'")]
    #[diagnostic(code(runbook::invalid_action_id))]
    InvalidActionId { id: String },

    #[error("[RB-023] Service '{service}' cannot bind client: expected {expected}")]
    #[diagnostic(code(runbook::client_mismatch))]
    ClientMismatch { service: String, expected: String },

    #[error("[RB-024] Service '{service}' is registered twice")]
    #[diagnostic(code(runbook::duplicate_service))]
    DuplicateService { service: String },

    // ═══════════════════════════════════════════
    // DISPATCH ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[RB-030] Action '{action}' failed: {reason}")]
    #[diagnostic(code(runbook::action_failed))]
    ActionFailed { action: String, reason: String },

    #[error("[RB-031] Action '{action}' received an invalid request: {reason}")]
    #[diagnostic(code(runbook::request_decode))]
    RequestDecode { action: String, reason: String },

    // ═══════════════════════════════════════════
    // SWITCH / VARIABLE ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[RB-040] Invalid switch directive: {reason}")]
    #[diagnostic(code(runbook::invalid_switch))]
    InvalidSwitch { reason: String },

    #[error("[RB-041] Invalid variable '{name}': {reason}")]
    #[diagnostic(code(runbook::invalid_variable))]
    InvalidVariable { name: String, reason: String },

    #[error("[RB-042] Required variable '{name}' has no value (source: {source_path})")]
    #[diagnostic(code(runbook::variable_missing))]
    VariableMissing { name: String, source_path: String },

    #[error("[RB-043] Function {udf} cannot convert value: {reason}")]
    #[diagnostic(code(runbook::udf_failed))]
    UdfFailed { udf: String, reason: String },

    // ═══════════════════════════════════════════
    // FATAL ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[RB-050] Run stopped: {reason}")]
    #[diagnostic(code(runbook::stopped))]
    Stopped { reason: String },

    #[error("[RB-051] Recovery task '{recovery}' for '{task}' failed: {reason}")]
    #[diagnostic(code(runbook::recovery_failed))]
    RecoveryFailed {
        task: String,
        recovery: String,
        reason: String,
    },

    #[error("[RB-052] Run aborted: {reason}")]
    #[diagnostic(code(runbook::run_aborted))]
    RunAborted { reason: String },

    // ═══════════════════════════════════════════
    // SESSION ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[RB-060] Unknown session '{id}'")]
    #[diagnostic(code(runbook::unknown_session))]
    UnknownSession { id: String },

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (070-079)
    // ═══════════════════════════════════════════
    #[error("[RB-070] Config error: {reason}")]
    #[diagnostic(code(runbook::config_error))]
    ConfigError { reason: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(runbook::io_error))]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    #[diagnostic(code(runbook::yaml_error))]
    YamlParse(#[from] serde_yaml::Error),
}

impl RunbookError {
    /// Stable error code (e.g. "RB-030")
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "RB-001",
            Self::WorkflowNotFound { .. } => "RB-002",
            Self::InvalidRequest { .. } => "RB-003",
            Self::InvalidWorkflow { .. } => "RB-004",
            Self::TaskNotFound { .. } => "RB-010",
            Self::UnknownRecoveryTask { .. } => "RB-011",
            Self::UnknownService { .. } => "RB-020",
            Self::UnknownAction { .. } => "RB-021",
            Self::InvalidActionId { .. } => "RB-022",
            Self::ClientMismatch { .. } => "RB-023",
            Self::DuplicateService { .. } => "RB-024",
            Self::ActionFailed { .. } => "RB-030",
            Self::RequestDecode { .. } => "RB-031",
            Self::InvalidSwitch { .. } => "RB-040",
            Self::InvalidVariable { .. } => "RB-041",
            Self::VariableMissing { .. } => "RB-042",
            Self::UdfFailed { .. } => "RB-043",
            Self::Stopped { .. } => "RB-050",
            Self::RecoveryFailed { .. } => "RB-051",
            Self::RunAborted { .. } => "RB-052",
            Self::UnknownSession { .. } => "RB-060",
            Self::ConfigError { .. } => "RB-070",
            Self::Io(_) => "RB-071",
            Self::YamlParse(_) => "RB-072",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseError { .. }
            | Self::WorkflowNotFound { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidWorkflow { .. }
            | Self::TaskNotFound { .. }
            | Self::UnknownRecoveryTask { .. }
            | Self::UnknownService { .. }
            | Self::UnknownAction { .. }
            | Self::InvalidActionId { .. }
            | Self::ClientMismatch { .. }
            | Self::DuplicateService { .. }
            | Self::InvalidSwitch { .. }
            | Self::InvalidVariable { .. }
            | Self::YamlParse(_) => ErrorKind::Validation,
            Self::ActionFailed { .. }
            | Self::RequestDecode { .. }
            | Self::VariableMissing { .. }
            | Self::UdfFailed { .. } => ErrorKind::Dispatch,
            Self::Stopped { .. } | Self::RecoveryFailed { .. } | Self::RunAborted { .. } => {
                ErrorKind::Fatal
            }
            Self::UnknownSession { .. } => ErrorKind::Session,
            Self::ConfigError { .. } | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether a recovery task may handle this error
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Dispatch
    }
}

impl FixSuggestion for RunbookError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::ParseError { .. } | Self::YamlParse(_) => {
                Some("Check YAML syntax: indentation and quoting")
            }
            Self::WorkflowNotFound { .. } => Some("Register the workflow before running it"),
            Self::InvalidRequest { .. } => Some("Check the run request fields"),
            Self::InvalidWorkflow { .. } => Some("Fix the workflow definition and validate it again"),
            Self::TaskNotFound { .. } => {
                Some("Use '*' or a comma-separated list of task names declared in the workflow")
            }
            Self::UnknownRecoveryTask { .. } => Some("Point on_error at a task declared in the same workflow"),
            Self::UnknownService { .. } => Some("Register the service or fix the namespace"),
            Self::UnknownAction { .. } => Some("Check the verb name against the service's registered verbs"),
            Self::InvalidActionId { .. } => Some("Use the 'namespace.verb' form, e.g. nop.parrot"),
            Self::ClientMismatch { .. } => Some("Bind the client type the service verbs expect"),
            Self::DuplicateService { .. } => Some("Use a distinct namespace per service"),
            Self::ActionFailed { .. } => Some("Bind an on_error task to recover, or fix the action request"),
            Self::RequestDecode { .. } => Some("Check the request fields expected by the verb"),
            Self::InvalidSwitch { .. } => {
                Some("A switch needs a key and at least one case with a value, or a default")
            }
            Self::InvalidVariable { .. } => Some("Set exactly one of 'value' or 'from'"),
            Self::VariableMissing { .. } => Some("Seed the value with params/init or drop 'required'"),
            Self::UdfFailed { .. } => Some("Check the value type passed to the function"),
            Self::Stopped { .. } => None,
            Self::RecoveryFailed { .. } => Some("Recovery tasks must not fail; check their actions"),
            Self::RunAborted { .. } => Some("A service panicked; check the service implementation"),
            Self::UnknownSession { .. } => Some("Use the session id returned by an async run"),
            Self::ConfigError { .. } => Some("Check ~/.config/runbook/config.toml syntax"),
            Self::Io(_) => Some("Check file path and permissions"),
        }
    }
}
