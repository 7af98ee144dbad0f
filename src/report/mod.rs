//! Report Module - terminal consumer of session events
//!
//! - `Reporter`: drain loop with initial delay and bounded waits
//! - `UseCase`: per-marker aggregation (assertions, errors, event copies)
//! - `render`: colored one-line-per-event output and summary

pub mod render;
mod reporter;

pub use reporter::{
    ReportFilter, Reporter, ReporterConfig, RunStatus, Summary, UseCase,
};
