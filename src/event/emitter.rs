//! EventEmitter - sink abstraction for engine and service events
//!
//! - `Session` appends live (ids and pairing assigned on append)
//! - `EventBatch` buffers events of a concurrently dispatched action so
//!   they can be appended contiguously afterwards
//! - `NoopEmitter` discards everything (tests, validation)

use parking_lot::Mutex;

use super::log::{Event, EventKind, SessionClock};

pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: Event);

    /// Clock used to stamp events for this sink
    fn clock(&self) -> SessionClock;

    /// Create an event of `kind` stamped now
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind, &self.clock())
    }
}

/// Buffered sink for one action's informational events
#[derive(Debug)]
pub struct EventBatch {
    clock: SessionClock,
    events: Mutex<Vec<Event>>,
}

impl EventBatch {
    pub fn new(clock: SessionClock) -> Self {
        Self {
            clock,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventEmitter for EventBatch {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn clock(&self) -> SessionClock {
        self.clock
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NoopEmitter {
    clock: SessionClock,
}

impl Default for NoopEmitter {
    fn default() -> Self {
        Self {
            clock: SessionClock::start(),
        }
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: Event) {}

    fn clock(&self) -> SessionClock {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_keeps_order_and_drains() {
        let batch = EventBatch::new(SessionClock::start());
        batch.emit(batch.event(EventKind::Stdin).with_field("n", 1));
        batch.emit(batch.event(EventKind::Stdout).with_field("n", 2));
        assert_eq!(batch.len(), 2);

        let events = batch.take();
        assert_eq!(events[0].kind, EventKind::Stdin);
        assert_eq!(events[1].kind, EventKind::Stdout);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_noop_discards() {
        let noop = NoopEmitter::default();
        noop.emit(noop.event(EventKind::Print));
    }
}
