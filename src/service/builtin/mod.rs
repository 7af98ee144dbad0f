//! Built-in services
//!
//! | Namespace | Verbs | Client |
//! |-----------|-------|--------|
//! | `nop` | nop, parrot, fail | none |
//! | `workflow` | print, sleep, fail | none |
//! | `validator` | assert | none |
//! | `exec` | run | none |
//! | `http` | send | `reqwest::Client` |

pub mod exec;
pub mod http;
pub mod nop;
pub mod validator;
pub mod workflow;

use crate::error::Result;

use super::Service;

pub fn services() -> Result<Vec<Service>> {
    Ok(vec![
        nop::service()?,
        workflow::service()?,
        validator::service()?,
        exec::service()?,
        http::service()?,
    ])
}
