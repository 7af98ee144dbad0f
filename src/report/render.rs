//! Terminal rendering for events and the run summary

use colored::{ColoredString, Colorize};
use serde_json::Value;

use crate::event::{Event, EventKind, Level};
use crate::state::value_to_string;

use super::{RunStatus, Summary};

fn tag(event: &Event) -> ColoredString {
    let tag = format!("{:<14}", event.kind.tag());
    match (event.kind, event.level) {
        (_, Level::Error) => tag.red().bold(),
        (EventKind::Error, _) | (_, Level::Warn) => tag.yellow(),
        (EventKind::WorkflowStart | EventKind::WorkflowEnd, _) => tag.magenta().bold(),
        (EventKind::TaskStart | EventKind::TaskEnd, _) => tag.cyan(),
        (EventKind::UseCase, _) => tag.blue().bold(),
        (_, Level::Debug) => tag.dimmed(),
        _ => tag.normal(),
    }
}

fn text(event: &Event, key: &str) -> String {
    match event.field(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Short description of an event's payload
fn detail(event: &Event) -> String {
    match event.kind {
        EventKind::WorkflowStart => text(event, "workflow"),
        EventKind::WorkflowEnd => format!("{} {}", text(event, "workflow"), text(event, "status")),
        EventKind::TaskStart => text(event, "task"),
        EventKind::TaskEnd => format!("{} {}", text(event, "task"), text(event, "status")),
        EventKind::ActionStart => {
            let description = text(event, "description");
            if description.is_empty() {
                text(event, "action")
            } else {
                format!("{} ({})", text(event, "action"), description)
            }
        }
        EventKind::ActionEnd => {
            let error = event
                .field("response")
                .and_then(|r| r.get("error"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if error.is_empty() {
                text(event, "action")
            } else {
                format!("{} {}", text(event, "action"), error)
            }
        }
        EventKind::UseCase => format!("{} {}", text(event, "use_case"), text(event, "description")),
        EventKind::Error => text(event, "error"),
        EventKind::Print => text(event, "message"),
        EventKind::Sleep => format!("{}ms", text(event, "duration_ms")),
        EventKind::Stdin => text(event, "stdin"),
        EventKind::Stdout => text(event, "stdout").trim_end().to_string(),
        EventKind::HttpRequest => format!("{} {}", text(event, "method"), text(event, "url")),
        EventKind::HttpResponse => format!("{} {}", text(event, "code"), text(event, "url")),
        EventKind::Assertion => {
            let failures: Vec<String> = event
                .field("failed")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(|v| value_to_string(v).into_owned()).collect())
                .unwrap_or_default();
            let mut line = format!("passed: {}, failed: {}", text(event, "passed"), failures.len());
            if !failures.is_empty() {
                line.push_str(&format!(" ({})", failures.join("; ")));
            }
            line
        }
    }
}

/// One line per event
pub fn render_event(event: &Event) -> String {
    let elapsed = event
        .elapsed_ms
        .map(|ms| format!(" [{}ms]", ms).dimmed().to_string())
        .unwrap_or_default();
    format!(
        "{} {} {}{}",
        event.at.format("%H:%M:%S%.3f").to_string().dimmed(),
        tag(event),
        detail(event),
        elapsed
    )
}

pub fn render_summary(summary: &Summary) -> String {
    let status = match summary.status {
        RunStatus::Success => "SUCCESS".green().bold(),
        RunStatus::Error => "ERROR".red().bold(),
    };
    format!(
        "{}: use cases passed: {}, failed: {}, elapsed: {}ms",
        status, summary.passed, summary.failed, summary.elapsed_ms
    )
}
