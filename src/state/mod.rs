//! State Module - hierarchical run-time scope
//!
//! Key types:
//! - `StateStore`: explicit stack of frames, innermost-first lookups
//! - `Frame`: one scope level (sorted map, deterministic output)
//! - `template`: `${path}` / `$name` placeholder expansion

mod store;
pub mod template;

pub use store::{Frame, StateStore};
pub use template::value_to_string;
