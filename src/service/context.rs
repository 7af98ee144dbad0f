//! ActionContext - what a handler sees of the running session

use std::sync::Arc;

use crate::event::{Event, EventEmitter, EventKind, NoopEmitter};
use crate::session::SessionId;

/// Per-dispatch context handed to every service handler
#[derive(Clone)]
pub struct ActionContext {
    pub session_id: SessionId,
    pub workflow: Arc<str>,
    pub task: Arc<str>,
    /// `namespace.verb` of the dispatched action
    pub action: Arc<str>,
    emitter: Arc<dyn EventEmitter>,
}

impl ActionContext {
    pub fn new(
        session_id: SessionId,
        workflow: Arc<str>,
        task: Arc<str>,
        action: Arc<str>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            session_id,
            workflow,
            task,
            action,
            emitter,
        }
    }

    /// Context whose events go nowhere (direct handler calls in tests)
    pub fn detached(action: &str) -> Self {
        Self::new(
            SessionId::from("detached"),
            Arc::from(""),
            Arc::from(""),
            Arc::from(action),
            Arc::new(NoopEmitter::default()),
        )
    }

    /// Informational event tagged with the current task and action
    pub fn event(&self, kind: EventKind) -> Event {
        self.emitter
            .event(kind)
            .with_field("task", self.task.as_ref())
            .with_field("action", self.action.as_ref())
    }

    pub fn emit(&self, event: Event) {
        self.emitter.emit(event);
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("session_id", &self.session_id)
            .field("task", &self.task)
            .field("action", &self.action)
            .finish()
    }
}
