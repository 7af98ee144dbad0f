//! SessionRegistry - live and retired sessions
//!
//! Uses DashMap for lock-free concurrent access from many runs and
//! consumers. A session is retired when a consumer drains it empty after
//! deactivation, or when the engine releases a finished sync run: it is
//! removed from the map and its id remembered so late consumers still get
//! empty batches instead of errors. Only the most recent
//! `RETIRED_CAPACITY` ids are remembered; older ones become unknown.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::{Result, RunbookError};
use crate::event::Event;

use super::buffer::{Session, SessionId};

/// Retired ids kept answerable
pub const RETIRED_CAPACITY: usize = 4096;

/// Capacity-capped FIFO of retired ids
#[derive(Debug, Default)]
struct RetiredIds {
    order: VecDeque<SessionId>,
    ids: FxHashSet<SessionId>,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    retired: Mutex<RetiredIds>,
    retired_capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_retired_capacity(RETIRED_CAPACITY)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retired_capacity(retired_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            retired: Mutex::new(RetiredIds::default()),
            retired_capacity,
        }
    }

    /// Create and register a fresh session
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(SessionId::generate()));
        self.sessions
            .insert(session.id().clone(), Arc::clone(&session));
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Events appended since the previous drain; never errors for a known id
    pub fn drain(&self, id: &SessionId) -> Result<Vec<Event>> {
        let Some(session) = self.get(id) else {
            return self.retired_or_unknown(id).map(|_| Vec::new());
        };

        // Activity is read first: an inactive session receives no more appends
        let active = session.is_active();
        let batch = session.drain();
        if batch.is_empty() && !active {
            self.retire(id);
        }
        Ok(batch)
    }

    pub fn is_active(&self, id: &SessionId) -> bool {
        self.get(id).is_some_and(|session| session.is_active())
    }

    /// Block until events are pending, the session ends, or `timeout` elapses
    pub async fn wait(&self, id: &SessionId, timeout: Duration) -> Result<bool> {
        match self.get(id) {
            Some(session) => Ok(session.wait(timeout).await),
            None => self.retired_or_unknown(id).map(|_| true),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Retire a session nobody will drain (finished sync runs)
    pub(crate) fn release(&self, id: &SessionId) {
        self.retire(id);
    }

    pub fn retired_len(&self) -> usize {
        self.retired.lock().order.len()
    }

    fn retire(&self, id: &SessionId) {
        if self.sessions.remove(id).is_none() {
            return;
        }
        debug!(session = %id, "session retired");
        if self.retired_capacity == 0 {
            return;
        }
        let mut retired = self.retired.lock();
        while retired.order.len() >= self.retired_capacity {
            if let Some(oldest) = retired.order.pop_front() {
                retired.ids.remove(&oldest);
            }
        }
        retired.order.push_back(id.clone());
        retired.ids.insert(id.clone());
    }

    fn retired_or_unknown(&self, id: &SessionId) -> Result<()> {
        if self.retired.lock().ids.contains(id) {
            Ok(())
        } else {
            Err(RunbookError::UnknownSession { id: id.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventEmitter, EventKind};

    #[test]
    fn test_drain_empty_active_session() {
        let registry = SessionRegistry::new();
        let session = registry.create();
        assert!(registry.drain(session.id()).unwrap().is_empty());
        assert!(registry.is_active(session.id()));
    }

    #[test]
    fn test_unknown_session_errors() {
        let registry = SessionRegistry::new();
        let err = registry.drain(&SessionId::from("nope")).unwrap_err();
        assert_eq!(err.code(), "RB-060");
        assert!(!registry.is_active(&SessionId::from("nope")));
    }

    #[test]
    fn test_retire_after_final_drain() {
        let registry = SessionRegistry::new();
        let session = registry.create();
        let id = session.id().clone();
        session.append(session.event(EventKind::WorkflowStart));
        session.append(session.event(EventKind::WorkflowEnd));
        session.deactivate();

        // Pending events are still delivered after deactivation
        assert_eq!(registry.drain(&id).unwrap().len(), 2);
        assert_eq!(registry.len(), 1);

        assert!(registry.drain(&id).unwrap().is_empty());
        assert!(registry.is_empty());

        // Retired ids stay known
        assert!(registry.drain(&id).unwrap().is_empty());
        assert!(!registry.is_active(&id));
    }

    #[tokio::test]
    async fn test_wait_on_retired_session_returns() {
        let registry = SessionRegistry::new();
        let session = registry.create();
        let id = session.id().clone();
        session.deactivate();
        registry.drain(&id).unwrap();
        assert!(registry.wait(&id, Duration::from_secs(5)).await.unwrap());
    }

    #[test]
    fn test_release_retires_undrained_session() {
        let registry = SessionRegistry::new();
        let session = registry.create();
        let id = session.id().clone();
        session.append(session.event(EventKind::WorkflowStart));
        session.deactivate();

        registry.release(&id);
        assert!(registry.is_empty());
        assert!(registry.drain(&id).unwrap().is_empty());
    }

    #[test]
    fn test_retired_ids_are_capped() {
        let registry = SessionRegistry::with_retired_capacity(2);
        let ids: Vec<SessionId> = (0..3)
            .map(|_| {
                let session = registry.create();
                session.deactivate();
                let id = session.id().clone();
                registry.release(&id);
                id
            })
            .collect();

        assert_eq!(registry.retired_len(), 2);
        assert_eq!(registry.drain(&ids[0]).unwrap_err().code(), "RB-060");
        assert!(registry.drain(&ids[1]).unwrap().is_empty());
        assert!(registry.drain(&ids[2]).unwrap().is_empty());
    }
}
