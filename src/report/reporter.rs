//! Reporter - polling consumer of a session's event stream
//!
//! Drained events are gone from the session, so the reporter keeps its
//! own copy per use case for diagnostic replay of failed ones.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::event::{Event, EventKind, Level};
use crate::runtime::Engine;
use crate::session::SessionId;

use super::render::{render_event, render_summary};

/// Which event kinds get rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFilter {
    pub workflow: bool,
    pub task: bool,
    pub action: bool,
    pub use_case: bool,
    pub error: bool,
    pub print: bool,
    pub assertion: bool,
    /// Stdin / Stdout of executed commands
    pub stdout: bool,
    /// HttpRequest / HttpResponse
    pub http: bool,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            workflow: true,
            task: true,
            action: true,
            use_case: true,
            error: true,
            print: true,
            assertion: true,
            stdout: false,
            http: false,
        }
    }
}

impl ReportFilter {
    pub fn all() -> Self {
        Self {
            stdout: true,
            http: true,
            ..Self::default()
        }
    }

    pub fn allows(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::WorkflowStart | EventKind::WorkflowEnd => self.workflow,
            EventKind::TaskStart | EventKind::TaskEnd => self.task,
            EventKind::ActionStart | EventKind::ActionEnd => self.action,
            EventKind::UseCase => self.use_case,
            EventKind::Error => self.error,
            EventKind::Print | EventKind::Sleep => self.print,
            EventKind::Assertion => self.assertion,
            EventKind::Stdin | EventKind::Stdout => self.stdout,
            EventKind::HttpRequest | EventKind::HttpResponse => self.http,
        }
    }
}

/// Explicit reporter settings (no process-wide defaults)
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Delay before the first drain
    pub initial_delay: Duration,
    /// Upper bound of each wait between empty drains
    pub poll_interval: Duration,
    pub filter: ReportFilter,
    /// Filter applied when replaying failed use cases
    pub on_failure: ReportFilter,
    pub first_failure_only: bool,
}

impl ReporterConfig {
    pub fn new(initial_delay: Duration, poll_interval: Duration) -> Self {
        Self {
            initial_delay,
            poll_interval,
            filter: ReportFilter::default(),
            on_failure: ReportFilter::all(),
            first_failure_only: false,
        }
    }
}

/// Events grouped between `UseCase` markers
#[derive(Debug, Clone, Default)]
pub struct UseCase {
    pub name: String,
    pub description: String,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
    pub errors: usize,
    pub events: Vec<Event>,
}

impl UseCase {
    fn open(event: &Event) -> Self {
        Self {
            name: event.field_str("use_case").unwrap_or_default().to_string(),
            description: event.field_str("description").unwrap_or_default().to_string(),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed_assertions > 0 || self.errors > 0
    }

    /// Events before the first marker form an unnamed use case that only
    /// counts when it recorded something
    fn is_reportable(&self) -> bool {
        !self.name.is_empty() || self.passed_assertions > 0 || self.is_failed()
    }

    fn record(&mut self, event: &Event) {
        match event.kind {
            EventKind::Assertion => {
                self.passed_assertions += event
                    .field("passed")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize;
                self.failed_assertions += event
                    .field("failed")
                    .and_then(|v| v.as_array())
                    .map(Vec::len)
                    .unwrap_or(0);
            }
            EventKind::Error if event.level == Level::Error => self.errors += 1,
            _ => {}
        }
        self.events.push(event.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    pub status: RunStatus,
}

pub struct Reporter<W: Write> {
    config: ReporterConfig,
    out: W,
    use_cases: Vec<UseCase>,
    run_failed: bool,
    first_at: Option<DateTime<Utc>>,
    last_at: Option<DateTime<Utc>>,
}

impl<W: Write> Reporter<W> {
    pub fn new(config: ReporterConfig, out: W) -> Self {
        Self {
            config,
            out,
            use_cases: vec![UseCase::default()],
            run_failed: false,
            first_at: None,
            last_at: None,
        }
    }

    /// Poll a session until it is inactive and fully drained
    pub async fn follow(&mut self, engine: &Engine, session_id: &SessionId) -> Result<Summary> {
        tokio::time::sleep(self.config.initial_delay).await;
        loop {
            // Read activity before draining: an inactive session gets no more events
            let active = engine.is_active(session_id);
            let batch = engine.drain(session_id)?;
            if batch.is_empty() {
                if !active {
                    break;
                }
                engine
                    .wait_for_events(session_id, self.config.poll_interval)
                    .await?;
                continue;
            }
            debug!(session = %session_id, events = batch.len(), "drained");
            for event in batch {
                self.process(event)?;
            }
        }
        self.finish()
    }

    /// Render and aggregate one event
    pub fn process(&mut self, event: Event) -> Result<()> {
        self.first_at.get_or_insert(event.at);
        self.last_at = Some(event.at);

        if event.kind == EventKind::UseCase {
            self.use_cases.push(UseCase::open(&event));
        }
        if event.kind == EventKind::Error && event.level == Level::Error {
            self.run_failed = true;
        }
        if let Some(current) = self.use_cases.last_mut() {
            current.record(&event);
        }

        if self.config.filter.allows(event.kind) {
            writeln!(self.out, "{}", render_event(&event))?;
        }
        Ok(())
    }

    pub fn use_cases(&self) -> impl Iterator<Item = &UseCase> {
        self.use_cases.iter().filter(|uc| uc.is_reportable())
    }

    pub fn summary(&self) -> Summary {
        let failed = self.use_cases().filter(|uc| uc.is_failed()).count();
        let passed = self.use_cases().count() - failed;
        let elapsed_ms = match (self.first_at, self.last_at) {
            (Some(first), Some(last)) => (last - first).num_milliseconds().max(0) as u64,
            _ => 0,
        };
        let status = if self.run_failed || failed > 0 {
            RunStatus::Error
        } else {
            RunStatus::Success
        };
        Summary {
            passed,
            failed,
            elapsed_ms,
            status,
        }
    }

    /// Replay failed use cases, then print the summary
    pub fn finish(&mut self) -> Result<Summary> {
        let failed: Vec<&UseCase> = self
            .use_cases
            .iter()
            .filter(|uc| uc.is_reportable() && uc.is_failed())
            .take(if self.config.first_failure_only { 1 } else { usize::MAX })
            .collect();

        for use_case in failed {
            writeln!(
                self.out,
                "--- failed use case: {} {}",
                use_case.name, use_case.description
            )?;
            for event in use_case
                .events
                .iter()
                .filter(|e| self.config.on_failure.allows(e.kind))
            {
                writeln!(self.out, "{}", render_event(event))?;
            }
        }

        let summary = self.summary();
        writeln!(self.out, "{}", render_summary(&summary))?;
        Ok(summary)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SessionClock;
    use serde_json::json;

    fn config() -> ReporterConfig {
        ReporterConfig::new(Duration::ZERO, Duration::from_millis(10))
    }

    fn event(kind: EventKind, clock: &SessionClock) -> Event {
        Event::new(kind, clock)
    }

    #[test]
    fn test_use_cases_aggregate_assertions() {
        colored::control::set_override(false);
        let clock = SessionClock::start();
        let mut reporter = Reporter::new(config(), Vec::new());

        reporter.process(event(EventKind::WorkflowStart, &clock)).unwrap();
        reporter
            .process(event(EventKind::UseCase, &clock).with_field("use_case", "UC-1"))
            .unwrap();
        reporter
            .process(
                event(EventKind::Assertion, &clock)
                    .with_field("passed", 2)
                    .with_field("failed", json!([])),
            )
            .unwrap();
        reporter
            .process(event(EventKind::UseCase, &clock).with_field("use_case", "UC-2"))
            .unwrap();
        reporter
            .process(
                event(EventKind::Assertion, &clock)
                    .with_field("passed", 0)
                    .with_field("failed", json!(["code: expected '200', actual '500'"])),
            )
            .unwrap();

        let summary = reporter.finish().unwrap();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.status, RunStatus::Error);

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.contains("--- failed use case: UC-2"));
        assert!(!output.contains("--- failed use case: UC-1"));
    }

    #[test]
    fn test_fatal_error_marks_run_failed() {
        let clock = SessionClock::start();
        let mut reporter = Reporter::new(config(), std::io::sink());
        reporter
            .process(event(EventKind::Error, &clock).with_level(Level::Warn))
            .unwrap();
        assert_eq!(reporter.summary().status, RunStatus::Success);
        reporter.process(event(EventKind::Error, &clock)).unwrap();
        assert_eq!(reporter.summary().status, RunStatus::Error);
    }

    #[test]
    fn test_filter_hides_stdout_by_default() {
        let filter = ReportFilter::default();
        assert!(!filter.allows(EventKind::Stdout));
        assert!(filter.allows(EventKind::TaskEnd));
        assert!(ReportFilter::all().allows(EventKind::HttpRequest));
    }

    #[test]
    fn test_first_failure_only() {
        colored::control::set_override(false);
        let clock = SessionClock::start();
        let mut cfg = config();
        cfg.first_failure_only = true;
        let mut reporter = Reporter::new(cfg, Vec::new());
        for name in ["UC-1", "UC-2"] {
            reporter
                .process(event(EventKind::UseCase, &clock).with_field("use_case", name))
                .unwrap();
            reporter.process(event(EventKind::Error, &clock)).unwrap();
        }
        let summary = reporter.finish().unwrap();
        assert_eq!(summary.failed, 2);
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.contains("failed use case: UC-1"));
        assert!(!output.contains("failed use case: UC-2"));
    }
}
