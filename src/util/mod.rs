//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized timeouts and limits for built-in services
//! - `jsonpath`: Minimal dotted-path parser for state and response lookups

pub mod constants;
pub mod jsonpath;

pub use constants::{CONNECT_TIMEOUT, EXEC_TIMEOUT, HTTP_TIMEOUT, REDIRECT_LIMIT};
