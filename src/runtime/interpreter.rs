//! Interpreter - walks one session's task/action graph
//!
//! Every action goes through the same three steps:
//! - prepare: resolve switches, evaluate init, expand the request (own frame)
//! - dispatch: call the resolved verb
//! - finish: record the response, evaluate post, publish into the task frame
//!
//! Sequential tasks run the steps action by action. Async tasks prepare
//! every action first, dispatch them concurrently, then finish them in
//! declaration order so each action's events stay contiguous.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::ast::{Action, Task, Variable, Workflow};
use crate::error::{Result, RunbookError};
use crate::event::{Event, EventBatch, EventEmitter, EventKind, Level};
use crate::service::{ActionContext, Registry, Resolved, ServiceResponse};
use crate::session::Session;
use crate::state::{value_to_string, Frame, StateStore};

use super::engine::LoggingOptions;
use super::variables::{self, Assignment};

/// State key receiving the message of a recovered failure
pub const ERROR_KEY: &str = "error";
/// Action-frame key holding the dispatch response during `post`
pub const RESPONSE_KEY: &str = "response";

/// An action ready to dispatch
struct Prepared {
    resolved: Resolved,
    request: Value,
    /// Action frame left after init (visible again to `post`)
    locals: Frame,
    /// Selected action's post, then enclosing switch actions' post
    post: Vec<Variable>,
    /// UseCase + Action.Start, stamped at prepare time
    opening: Vec<Event>,
}

pub(crate) struct Interpreter {
    registry: Arc<Registry>,
    workflow: Arc<Workflow>,
    session: Arc<Session>,
    state: StateStore,
    params: Frame,
    publish_params: bool,
}

impl Interpreter {
    pub fn new(
        registry: Arc<Registry>,
        workflow: Arc<Workflow>,
        session: Arc<Session>,
        params: Frame,
        publish_params: bool,
    ) -> Self {
        Self {
            state: StateStore::with_root(params.clone()),
            registry,
            workflow,
            session,
            params,
            publish_params,
        }
    }

    /// Run the selected tasks; the session is deactivated on every exit path
    #[instrument(name = "workflow", skip_all, fields(workflow = %self.workflow.name, session = %self.session.id()))]
    pub async fn run(
        mut self,
        tasks: Vec<Arc<Task>>,
        logging: Option<LoggingOptions>,
    ) -> Result<Frame> {
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        let mut start = self
            .session
            .event(EventKind::WorkflowStart)
            .with_field("workflow", self.workflow.name.as_str())
            .with_field("tasks", names);
        if let Some(logging) = &logging {
            match serde_json::to_value(logging) {
                Ok(value) => start = start.with_field("logging", value),
                Err(e) => warn!(error = %e, "logging options not recorded"),
            }
        }
        self.session.append(start);

        let result = self.run_tasks(&tasks).await;

        let mut end = self
            .session
            .event(EventKind::WorkflowEnd)
            .with_field("workflow", self.workflow.name.as_str());
        match &result {
            Ok(_) => {
                info!(tasks = tasks.len(), "workflow completed");
                end = end.with_field("status", "ok");
            }
            Err(e) => {
                warn!(error = %e, "workflow failed");
                self.session.append(
                    self.session
                        .event(EventKind::Error)
                        .with_field("error", e.to_string())
                        .with_field("code", e.code()),
                );
                end = end
                    .with_field("status", "failed")
                    .with_field("error", e.to_string())
                    .with_level(Level::Error);
            }
        }
        self.session.append(end);
        self.session.deactivate();
        result
    }

    async fn run_tasks(&mut self, tasks: &[Arc<Task>]) -> Result<Frame> {
        variables::apply_init(&mut self.state, &self.workflow.init)?;

        for task in tasks {
            self.run_task_with_recovery(task).await?;
        }
        self.published()
    }

    /// Published values: workflow `post` (over params when requested)
    fn published(&mut self) -> Result<Frame> {
        self.state.push();
        let writes = variables::collect_post(&mut self.state, &self.workflow.post);
        self.state.pop();

        let root = if self.publish_params {
            self.params.clone()
        } else {
            Frame::new()
        };
        let mut data = StateStore::with_root(root);
        variables::apply_all(&mut data, writes?);
        Ok(data.root().clone())
    }

    async fn run_task_with_recovery(&mut self, task: &Arc<Task>) -> Result<()> {
        let err = match self.run_task(task).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        let Some(recovery) = task.on_error.as_deref() else {
            return Err(err);
        };
        if !err.is_recoverable() {
            return Err(err);
        }
        let recovery_task = self
            .workflow
            .task(recovery)
            .cloned()
            .ok_or_else(|| RunbookError::UnknownRecoveryTask {
                task: task.name.clone(),
                recovery: recovery.to_string(),
            })?;

        warn!(task = %task.name, recovery, error = %err, "running recovery task");
        self.session.append(
            self.session
                .event(EventKind::Error)
                .with_level(Level::Warn)
                .with_field("task", task.name.as_str())
                .with_field("recovery", recovery)
                .with_field("error", err.to_string()),
        );
        self.state.put(ERROR_KEY, Value::String(err.to_string()));

        self.run_task(&recovery_task)
            .await
            .map_err(|e| RunbookError::RecoveryFailed {
                task: task.name.clone(),
                recovery: recovery.to_string(),
                reason: e.to_string(),
            })
    }

    async fn run_task(&mut self, task: &Task) -> Result<()> {
        debug!(task = %task.name, is_async = task.is_async, "task started");
        self.session.append(
            self.session
                .event(EventKind::TaskStart)
                .with_field("task", task.name.as_str())
                .with_field("async", task.is_async),
        );

        self.state.push();
        let result = self.run_task_body(task).await;
        self.state.pop();

        let mut end = self
            .session
            .event(EventKind::TaskEnd)
            .with_field("task", task.name.as_str());
        let result = match result {
            Ok(writes) => {
                variables::apply_all(&mut self.state, writes);
                end = end.with_field("status", "ok");
                Ok(())
            }
            Err(e) => {
                end = end
                    .with_field("status", "failed")
                    .with_field("error", e.to_string())
                    .with_level(Level::Error);
                Err(e)
            }
        };
        self.session.append(end);
        result
    }

    async fn run_task_body(&mut self, task: &Task) -> Result<Vec<Assignment>> {
        variables::apply_init(&mut self.state, &task.init)?;

        if task.is_async {
            self.run_concurrent(task).await?;
        } else {
            for action in &task.actions {
                self.run_action(task, action).await?;
            }
        }

        variables::collect_post(&mut self.state, &task.post)
    }

    async fn run_action(&mut self, task: &Task, action: &Action) -> Result<()> {
        let Some(mut prepared) = self.prepare(task, action)? else {
            return Ok(());
        };
        for event in prepared.opening.drain(..) {
            self.session.append(event);
        }

        let emitter: Arc<dyn EventEmitter> = self.session.clone();
        let ctx = self.context(task, &prepared, emitter);
        let outcome = prepared
            .resolved
            .dispatch(&ctx, std::mem::take(&mut prepared.request))
            .await;
        self.finish(task, prepared, outcome)
    }

    async fn run_concurrent(&mut self, task: &Task) -> Result<()> {
        let mut prepared = Vec::with_capacity(task.actions.len());
        for action in &task.actions {
            if let Some(p) = self.prepare(task, action)? {
                prepared.push(p);
            }
        }
        debug!(task = %task.name, actions = prepared.len(), "dispatching concurrently");

        let batches: Vec<Arc<EventBatch>> = prepared
            .iter()
            .map(|_| Arc::new(EventBatch::new(self.session.clock())))
            .collect();
        let contexts: Vec<ActionContext> = prepared
            .iter()
            .zip(&batches)
            .map(|(p, batch)| {
                let emitter: Arc<dyn EventEmitter> = batch.clone();
                self.context(task, p, emitter)
            })
            .collect();
        let outcomes = join_all(
            prepared
                .iter()
                .zip(&contexts)
                .map(|(p, ctx)| p.resolved.dispatch(ctx, p.request.clone())),
        )
        .await;

        let mut first_error = None;
        for ((mut p, outcome), batch) in prepared.into_iter().zip(outcomes).zip(batches) {
            for event in p.opening.drain(..).chain(batch.take()) {
                self.session.append(event);
            }
            if let Err(e) = self.finish(task, p, outcome) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn context(&self, task: &Task, prepared: &Prepared, emitter: Arc<dyn EventEmitter>) -> ActionContext {
        ActionContext::new(
            self.session.id().clone(),
            Arc::from(self.workflow.name.as_str()),
            Arc::from(task.name.as_str()),
            Arc::clone(prepared.resolved.id()),
            emitter,
        )
    }

    /// Resolve switches and build the request inside a fresh action frame
    ///
    /// `None` when a switch selects nothing: the action is a no-op.
    fn prepare(&mut self, task: &Task, action: &Action) -> Result<Option<Prepared>> {
        self.state.push();
        let result = self.prepare_in_frame(task, action);
        let locals = self.state.pop().unwrap_or_default();

        Ok(result?.map(|(selected, resolved, request, post)| {
            let mut opening = Vec::with_capacity(2);
            if let Some(use_case) = &selected.use_case {
                opening.push(
                    self.session
                        .event(EventKind::UseCase)
                        .with_field("use_case", use_case.as_str())
                        .with_field("task", task.name.as_str())
                        .with_field(
                            "description",
                            selected.description.clone().unwrap_or_default(),
                        ),
                );
            }
            opening.push(
                self.session
                    .event(EventKind::ActionStart)
                    .with_field("task", task.name.as_str())
                    .with_field("action", resolved.id().as_ref())
                    .with_field("description", selected.description.clone().unwrap_or_default())
                    .with_field("request", request.clone()),
            );
            Prepared {
                resolved,
                request,
                locals,
                post,
                opening,
            }
        }))
    }

    #[allow(clippy::type_complexity)]
    fn prepare_in_frame<'a>(
        &mut self,
        task: &Task,
        action: &'a Action,
    ) -> Result<Option<(&'a Action, Resolved, Value, Vec<Variable>)>> {
        let mut current = action;
        let mut enclosing: Vec<&'a [Variable]> = Vec::new();

        loop {
            variables::apply_init(&mut self.state, &current.init)?;
            let Some(directive) = &current.switch else {
                break;
            };
            let value = self.state.get(&directive.key).unwrap_or(Value::Null);
            let value = value_to_string(&value);
            match directive.select(&value) {
                Some(selected) => {
                    debug!(task = %task.name, key = %directive.key, value = %value, "switch case selected");
                    enclosing.push(&current.post);
                    current = selected;
                }
                None => {
                    debug!(task = %task.name, key = %directive.key, value = %value, "no switch case matched");
                    return Ok(None);
                }
            }
        }

        let location = format!("{}.{}", self.workflow.name, task.name);
        let resolved = self.registry.resolve(&current.action, &location)?;
        let request = self.state.expand(&current.request);

        let post = current
            .post
            .iter()
            .chain(enclosing.into_iter().rev().flatten())
            .cloned()
            .collect();
        Ok(Some((current, resolved, request, post)))
    }

    /// Record the outcome; on success publish `post` into the task frame
    fn finish(
        &mut self,
        task: &Task,
        prepared: Prepared,
        outcome: Result<Value>,
    ) -> Result<()> {
        let id = Arc::clone(prepared.resolved.id());
        let result = outcome.and_then(|response| {
            self.state.push_frame(prepared.locals);
            self.state.put(RESPONSE_KEY, response.clone());
            let writes = variables::collect_post(&mut self.state, &prepared.post);
            self.state.pop();
            variables::apply_all(&mut self.state, writes?);
            Ok(response)
        });

        let (service_response, level) = match &result {
            Ok(response) => (ServiceResponse::ok(response.clone()), Level::Info),
            Err(e) => (ServiceResponse::failed(e.to_string()), Level::Error),
        };
        self.session.append(
            self.session
                .event(EventKind::ActionEnd)
                .with_level(level)
                .with_field("task", task.name.as_str())
                .with_field("action", id.as_ref())
                .with_field(
                    "response",
                    serde_json::to_value(&service_response).unwrap_or_else(|_| json!({})),
                ),
        );
        result.map(|_| ())
    }
}
