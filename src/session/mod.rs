//! Session Module - per-run event buffers
//!
//! Key types:
//! - `Session`: append-only buffer, Start/End pairing, activity flag
//! - `SessionId`: opaque UUID identity
//! - `SessionRegistry`: concurrent lookup, drain and retirement

mod buffer;
mod registry;

pub use buffer::{Session, SessionId};
pub use registry::SessionRegistry;
