//! Event Module - structured progress events
//!
//! Key types:
//! - `Event`: envelope (id, timestamps, kind, level, payload, pairing)
//! - `EventKind`: closed enumeration, Start/End units + informational kinds
//! - `EventEmitter`: sink trait implemented by sessions and batches

mod emitter;
mod log;

pub use emitter::{EventBatch, EventEmitter, NoopEmitter};
pub use log::{Event, EventKind, Level, Phase, SessionClock, Unit};
