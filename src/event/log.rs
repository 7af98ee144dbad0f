//! Event envelope and closed set of event kinds
//!
//! - Event: envelope with session-local id + timestamps + kind + payload
//! - EventKind: 15 variants (paired Start/End units + informational events)
//! - SessionClock: per-session monotonic clock anchored to wall time

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Unit of work that emits a Start/End pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Workflow,
    Task,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
    /// Single informational event, never paired
    Info,
}

/// All event types
///
/// Serialized as their dotted tag (`"Workflow.Start"`, `"Stdout"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // PAIRED UNITS
    // ═══════════════════════════════════════════
    #[serde(rename = "Workflow.Start")]
    WorkflowStart,
    #[serde(rename = "Workflow.End")]
    WorkflowEnd,
    #[serde(rename = "Task.Start")]
    TaskStart,
    #[serde(rename = "Task.End")]
    TaskEnd,
    #[serde(rename = "Action.Start")]
    ActionStart,
    #[serde(rename = "Action.End")]
    ActionEnd,

    // ═══════════════════════════════════════════
    // INFORMATIONAL
    // ═══════════════════════════════════════════
    UseCase,
    Error,
    Print,
    Sleep,
    Stdin,
    Stdout,
    HttpRequest,
    HttpResponse,
    Assertion,
}

impl EventKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::WorkflowStart => "Workflow.Start",
            Self::WorkflowEnd => "Workflow.End",
            Self::TaskStart => "Task.Start",
            Self::TaskEnd => "Task.End",
            Self::ActionStart => "Action.Start",
            Self::ActionEnd => "Action.End",
            Self::UseCase => "UseCase",
            Self::Error => "Error",
            Self::Print => "Print",
            Self::Sleep => "Sleep",
            Self::Stdin => "Stdin",
            Self::Stdout => "Stdout",
            Self::HttpRequest => "HttpRequest",
            Self::HttpResponse => "HttpResponse",
            Self::Assertion => "Assertion",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::WorkflowStart | Self::TaskStart | Self::ActionStart => Phase::Start,
            Self::WorkflowEnd | Self::TaskEnd | Self::ActionEnd => Phase::End,
            _ => Phase::Info,
        }
    }

    /// Paired unit, `None` for informational events
    pub fn unit(&self) -> Option<Unit> {
        match self {
            Self::WorkflowStart | Self::WorkflowEnd => Some(Unit::Workflow),
            Self::TaskStart | Self::TaskEnd => Some(Unit::Task),
            Self::ActionStart | Self::ActionEnd => Some(Unit::Action),
            _ => None,
        }
    }

    pub fn default_level(&self) -> Level {
        match self {
            Self::Error => Level::Error,
            Self::Stdin | Self::Stdout | Self::HttpRequest | Self::HttpResponse => Level::Debug,
            _ => Level::Info,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-session clock: monotonic offsets plus the wall time of session start
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since session start (monotonic)
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Wall-clock time for a monotonic offset
    pub fn wall_time(&self, offset_ms: u64) -> DateTime<Utc> {
        self.started_at + chrono::Duration::milliseconds(offset_ms as i64)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Single event in a session's buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Session-local sequence id, assigned when the event is appended
    pub id: u64,
    /// Time since session start (ms, monotonic)
    pub timestamp_ms: u64,
    pub at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// Id of the matching Start event (End events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl Event {
    /// Create an event stamped with the session clock's current time
    pub fn new(kind: EventKind, clock: &SessionClock) -> Self {
        let timestamp_ms = clock.elapsed_ms();
        Self {
            id: 0,
            timestamp_ms,
            at: clock.wall_time(timestamp_ms),
            kind,
            level: kind.default_level(),
            fields: Map::new(),
            start_id: None,
            elapsed_ms: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn is_start(&self) -> bool {
        self.kind.phase() == Phase::Start
    }

    pub fn is_end(&self) -> bool {
        self.kind.phase() == Phase::End
    }
}
