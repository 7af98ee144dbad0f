//! Session - per-run event buffer with Start/End pairing
//!
//! One producer (the engine run) appends; any consumer drains.
//! - ids are session-local and follow append order
//! - each End is paired with the latest unmatched Start of the same unit
//! - `drain` never blocks; `wait` is the blocking-with-timeout primitive

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use crate::event::{Event, EventEmitter, EventKind, Level, Phase, SessionClock, Unit};

/// Opaque session identity (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn generate() -> Self {
        Self(Arc::from(uuid::Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct SessionLog {
    pending: Vec<Event>,
    /// Unmatched Start events per unit: (id, timestamp_ms)
    open: FxHashMap<Unit, Vec<(u64, u64)>>,
    next_id: u64,
}

pub struct Session {
    id: SessionId,
    clock: SessionClock,
    active: AtomicBool,
    log: Mutex<SessionLog>,
    notify: Notify,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            clock: SessionClock::start(),
            active: AtomicBool::new(true),
            log: Mutex::new(SessionLog::default()),
            notify: Notify::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Append an event, assigning its id and Start back-reference
    pub fn append(&self, mut event: Event) -> u64 {
        let id = {
            let mut log = self.log.lock();
            let id = log.next_id;
            log.next_id += 1;
            event.id = id;

            if let Some(unit) = event.kind.unit() {
                match event.kind.phase() {
                    Phase::Start => log
                        .open
                        .entry(unit)
                        .or_default()
                        .push((id, event.timestamp_ms)),
                    Phase::End => {
                        if let Some((start_id, started)) =
                            log.open.get_mut(&unit).and_then(Vec::pop)
                        {
                            event.start_id = Some(start_id);
                            event.elapsed_ms = Some(event.timestamp_ms.saturating_sub(started));
                        }
                    }
                    Phase::Info => {}
                }
            }

            log.pending.push(event);
            id
        };
        self.notify.notify_waiters();
        id
    }

    /// Take every pending event, in append order
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut self.log.lock().pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.log.lock().pending.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the session terminal; returns false if it already was
    pub fn deactivate(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        if was_active {
            debug!(session = %self.id, "session deactivated");
            self.notify.notify_waiters();
        }
        was_active
    }

    /// Terminate a run that could not finish normally
    ///
    /// Appends an `Error`, closes every unmatched Start (actions, then
    /// tasks, then the workflow) and deactivates. No-op when inactive.
    pub fn abort(&self, reason: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        self.append(
            self.event(EventKind::Error)
                .with_level(Level::Error)
                .with_field("error", reason),
        );
        for kind in [EventKind::ActionEnd, EventKind::TaskEnd, EventKind::WorkflowEnd] {
            let Some(unit) = kind.unit() else {
                continue;
            };
            let open = self.log.lock().open.get(&unit).map_or(0, Vec::len);
            for _ in 0..open {
                self.append(
                    self.event(kind)
                        .with_level(Level::Error)
                        .with_field("status", "aborted")
                        .with_field("error", reason),
                );
            }
        }
        self.deactivate()
    }

    /// Wait until events are pending or the session is inactive
    ///
    /// Returns false on timeout.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.has_pending() || !self.is_active() {
            return true;
        }
        tokio::time::timeout(timeout, notified).await.is_ok()
    }
}

impl EventEmitter for Session {
    fn emit(&self, event: Event) {
        self.append(event);
    }

    fn clock(&self) -> SessionClock {
        self.clock
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("pending", &self.log.lock().pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn session() -> Session {
        Session::new(SessionId::generate())
    }

    #[test]
    fn test_ids_follow_append_order() {
        let s = session();
        assert_eq!(s.append(s.event(EventKind::WorkflowStart)), 0);
        assert_eq!(s.append(s.event(EventKind::Print)), 1);
        let events = s.drain();
        assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_end_pairs_with_latest_open_start() {
        let s = session();
        s.append(s.event(EventKind::TaskStart)); // 0
        s.append(s.event(EventKind::ActionStart)); // 1
        s.append(s.event(EventKind::ActionEnd)); // 2
        s.append(s.event(EventKind::ActionStart)); // 3
        s.append(s.event(EventKind::ActionEnd)); // 4
        s.append(s.event(EventKind::TaskEnd)); // 5

        let events = s.drain();
        assert_eq!(events[2].start_id, Some(1));
        assert_eq!(events[4].start_id, Some(3));
        assert_eq!(events[5].start_id, Some(0));
        assert!(events[0].start_id.is_none());
        for end in events.iter().filter(|e| e.is_end()) {
            let start = &events[end.start_id.unwrap() as usize];
            assert_eq!(end.elapsed_ms, Some(end.timestamp_ms - start.timestamp_ms));
        }
    }

    #[test]
    fn test_elapsed_never_negative() {
        let s = session();
        let mut start = s.event(EventKind::ActionStart);
        start.timestamp_ms = 50;
        s.append(start);
        let mut end = s.event(EventKind::ActionEnd);
        end.timestamp_ms = 10;
        s.append(end);
        assert_eq!(s.drain()[1].elapsed_ms, Some(0));
    }

    #[test]
    fn test_drain_takes_once() {
        let s = session();
        s.append(s.event(EventKind::Print));
        assert_eq!(s.drain().len(), 1);
        assert!(s.drain().is_empty());
    }

    #[test]
    fn test_deactivate_exactly_once() {
        let s = session();
        assert!(s.deactivate());
        assert!(!s.deactivate());
        assert!(!s.is_active());
    }

    #[tokio::test]
    async fn test_wait_returns_on_append() {
        let s = Arc::new(session());
        let producer = {
            let s = Arc::clone(&s);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                s.append(s.event(EventKind::Print));
            })
        };
        assert!(s.wait(Duration::from_secs(5)).await);
        producer.await.unwrap();
        assert_eq!(s.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_times_out_when_idle() {
        let s = session();
        assert!(!s.wait(Duration::from_millis(10)).await);
    }

    #[test]
    fn test_abort_closes_open_units() {
        let session = session();
        session.append(session.event(EventKind::WorkflowStart));
        session.append(session.event(EventKind::TaskStart));
        session.append(session.event(EventKind::ActionStart));

        assert!(session.abort("handler panicked"));
        assert!(!session.is_active());
        assert!(!session.abort("again"));

        let events = session.drain();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::WorkflowStart,
                EventKind::TaskStart,
                EventKind::ActionStart,
                EventKind::Error,
                EventKind::ActionEnd,
                EventKind::TaskEnd,
                EventKind::WorkflowEnd,
            ]
        );
        assert_eq!(events[4].start_id, Some(2));
        assert_eq!(events[5].start_id, Some(1));
        assert_eq!(events[6].start_id, Some(0));
        assert_eq!(events[3].level, Level::Error);
    }
}
