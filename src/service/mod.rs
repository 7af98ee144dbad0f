//! Service Module - pluggable capabilities behind a uniform contract
//!
//! Key types:
//! - `Handler`: typed verb (client + request + response)
//! - `ServiceBuilder` / `Registry`: registration, then frozen lookup
//! - `ActionContext`: session identity and event sink for handlers
//! - `ServiceResponse`: uniform `{response, error}` result

pub mod builtin;
mod context;
mod handler;
mod registry;

pub use context::ActionContext;
pub use handler::Handler;
pub use registry::{Registry, RegistryBuilder, Resolved, Service, ServiceBuilder, ServiceResponse};
