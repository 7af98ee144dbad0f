//! `validator` service: structural assertions
//!
//! Expected objects are matched on their own keys only (actual may carry
//! more), sequences element by element, scalars by their string form.
//! Mismatches are reported, never raised as errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::event::{EventKind, Level};
use crate::service::{ActionContext, Handler, Service, ServiceBuilder};
use crate::state::value_to_string;

pub fn service() -> Result<Service> {
    ServiceBuilder::new("validator").verb("assert", Assert).bind(())
}

pub struct Assert;

#[derive(Debug, Deserialize)]
pub struct AssertRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expected: Value,
    #[serde(default)]
    pub actual: Value,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssertResponse {
    pub passed: usize,
    pub failed: Vec<String>,
}

#[async_trait]
impl Handler for Assert {
    type Client = ();
    type Request = AssertRequest;
    type Response = AssertResponse;

    async fn handle(
        &self,
        _: &(),
        ctx: &ActionContext,
        request: AssertRequest,
    ) -> anyhow::Result<AssertResponse> {
        let mut outcome = AssertResponse::default();
        compare("", &request.expected, &request.actual, &mut outcome);

        let level = if outcome.failed.is_empty() {
            Level::Info
        } else {
            Level::Warn
        };
        let mut event = ctx
            .event(EventKind::Assertion)
            .with_level(level)
            .with_field("passed", outcome.passed)
            .with_field("failed", outcome.failed.clone());
        if let Some(description) = request.description {
            event = event.with_field("description", description);
        }
        ctx.emit(event);

        Ok(outcome)
    }
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn compare(path: &str, expected: &Value, actual: &Value, out: &mut AssertResponse) {
    match expected {
        Value::Object(fields) => {
            for (key, want) in fields {
                let at = child(path, key);
                match actual.get(key) {
                    Some(got) => compare(&at, want, got, out),
                    None => out.failed.push(format!("{}: missing", at)),
                }
            }
        }
        Value::Array(items) => match actual.as_array() {
            Some(got) => {
                if got.len() < items.len() {
                    out.failed.push(format!(
                        "{}: expected {} items, actual {}",
                        path,
                        items.len(),
                        got.len()
                    ));
                }
                for (index, (want, have)) in items.iter().zip(got).enumerate() {
                    compare(&format!("{}[{}]", path, index), want, have, out);
                }
            }
            None => out
                .failed
                .push(format!("{}: expected a sequence, actual {}", path, actual)),
        },
        scalar => {
            let want = value_to_string(scalar);
            let have = value_to_string(actual);
            if want == have {
                out.passed += 1;
            } else {
                out.failed
                    .push(format!("{}: expected '{}', actual '{}'", path, want, have));
            }
        }
    }
}
