//! Engine - run entry point and consumer boundary
//!
//! `run` validates the request completely before a session exists, then
//! either blocks until the run is terminal (sync) or hands the interpreter
//! to the tokio scheduler and returns the session id (async). Sync
//! sessions are released as soon as the run returns; their events are
//! not retained.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::ast::{Task, Workflow};
use crate::error::{Result, RunbookError};
use crate::event::Event;
use crate::service::Registry;
use crate::session::{Session, SessionId, SessionRegistry};
use crate::state::Frame;

use super::interpreter::Interpreter;
use super::selector::{select_tasks, WILDCARD};
use super::validate::validate_run;

/// Logging directives, passed through to the `Workflow.Start` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub workflow: String,
    /// `*`, a task name, or comma-separated names
    #[serde(default = "default_selector")]
    pub tasks: String,
    #[serde(default)]
    pub params: Frame,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    /// Include params in the published data
    #[serde(default)]
    pub publish_params: bool,
    #[serde(default)]
    pub logging: Option<LoggingOptions>,
}

fn default_selector() -> String {
    WILDCARD.to_string()
}

impl RunRequest {
    pub fn new(workflow: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            tasks: default_selector(),
            params: Frame::new(),
            is_async: false,
            publish_params: false,
            logging: None,
        }
    }

    pub fn tasks(mut self, selector: impl Into<String>) -> Self {
        self.tasks = selector.into();
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn publish_params(mut self) -> Self {
        self.publish_params = true;
        self
    }

    pub fn logging(mut self, logging: LoggingOptions) -> Self {
        self.logging = Some(logging);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunResponse {
    /// Sync run finished; `data` holds the published values
    Completed { session_id: SessionId, data: Frame },
    /// Async run scheduled; progress is observable through the session
    Started { session_id: SessionId },
}

impl RunResponse {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Completed { session_id, .. } | Self::Started { session_id } => session_id,
        }
    }

    pub fn data(&self) -> Option<&Frame> {
        match self {
            Self::Completed { data, .. } => Some(data),
            Self::Started { .. } => None,
        }
    }
}

pub struct Engine {
    registry: Arc<Registry>,
    /// Workflow catalog (lock-free reads from concurrent runs)
    workflows: DashMap<String, Arc<Workflow>>,
    sessions: Arc<SessionRegistry>,
}

impl Engine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            workflows: DashMap::new(),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Add a workflow to the catalog, replacing one of the same name
    pub fn register_workflow(&self, workflow: Workflow) -> Result<Arc<Workflow>> {
        workflow.validate_structure()?;
        let workflow = Arc::new(workflow);
        self.workflows
            .insert(workflow.name.clone(), Arc::clone(&workflow));
        Ok(workflow)
    }

    pub fn workflow(&self, name: &str) -> Option<Arc<Workflow>> {
        self.workflows.get(name).map(|w| Arc::clone(w.value()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Validate and start a run
    #[instrument(skip(self, request), fields(workflow = %request.workflow, tasks = %request.tasks, is_async = request.is_async))]
    pub async fn run(&self, request: RunRequest) -> Result<RunResponse> {
        if request.workflow.trim().is_empty() {
            return Err(RunbookError::InvalidRequest {
                reason: "workflow name is empty".to_string(),
            });
        }
        let workflow =
            self.workflow(&request.workflow)
                .ok_or_else(|| RunbookError::WorkflowNotFound {
                    name: request.workflow.clone(),
                })?;
        let tasks = select_tasks(&workflow, &request.tasks)?;
        validate_run(&workflow, &tasks, &self.registry)?;

        let session = self.sessions.create();
        let session_id = session.id().clone();
        info!(session = %session_id, tasks = tasks.len(), "run started");

        let interpreter = Interpreter::new(
            Arc::clone(&self.registry),
            workflow,
            Arc::clone(&session),
            request.params,
            request.publish_params,
        );

        if request.is_async {
            let id = session_id.clone();
            tokio::spawn(async move {
                if let Err(e) = supervise(interpreter, session, tasks, request.logging).await {
                    warn!(session = %id, error = %e, "async run failed");
                }
            });
            return Ok(RunResponse::Started { session_id });
        }

        // Nobody drains a sync session: release it on every exit path
        let result = supervise(interpreter, session, tasks, request.logging).await;
        self.sessions.release(&session_id);
        let data = result?;
        Ok(RunResponse::Completed { session_id, data })
    }

    // ═══════════════════════════════════════════
    // CONSUMER BOUNDARY
    // ═══════════════════════════════════════════

    /// Non-blocking: events appended since the previous drain
    pub fn drain(&self, session_id: &SessionId) -> Result<Vec<Event>> {
        self.sessions.drain(session_id)
    }

    pub fn is_active(&self, session_id: &SessionId) -> bool {
        self.sessions.is_active(session_id)
    }

    /// Block up to `timeout` for new events or session end
    pub async fn wait_for_events(&self, session_id: &SessionId, timeout: Duration) -> Result<bool> {
        self.sessions.wait(session_id, timeout).await
    }
}

/// Run the interpreter on its own task so a panicking service still
/// leaves the session terminated and its Start events closed
async fn supervise(
    interpreter: Interpreter,
    session: Arc<Session>,
    tasks: Vec<Arc<Task>>,
    logging: Option<LoggingOptions>,
) -> Result<Frame> {
    match tokio::spawn(interpreter.run(tasks, logging)).await {
        Ok(result) => result,
        Err(join) => {
            let reason = join.to_string();
            error!(session = %session.id(), error = %reason, "run aborted");
            session.abort(&reason);
            Err(RunbookError::RunAborted { reason })
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("workflows", &self.workflows.len())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
