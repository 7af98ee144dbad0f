//! `workflow` service: print, sleep and the unconditional stop signal

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, RunbookError};
use crate::event::EventKind;
use crate::service::{ActionContext, Handler, Service, ServiceBuilder};

pub fn service() -> Result<Service> {
    ServiceBuilder::new("workflow")
        .verb("print", Print)
        .verb("sleep", Sleep)
        .verb("fail", Stop)
        .bind(())
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: String,
}

pub struct Print;

#[async_trait]
impl Handler for Print {
    type Client = ();
    type Request = MessageRequest;
    type Response = Value;

    async fn handle(
        &self,
        _: &(),
        ctx: &ActionContext,
        request: MessageRequest,
    ) -> anyhow::Result<Value> {
        ctx.emit(ctx.event(EventKind::Print).with_field("message", request.message));
        Ok(json!({}))
    }
}

pub struct Sleep;

#[derive(Debug, Deserialize)]
pub struct SleepRequest {
    #[serde(default)]
    pub duration_ms: u64,
}

#[async_trait]
impl Handler for Sleep {
    type Client = ();
    type Request = SleepRequest;
    type Response = Value;

    async fn handle(&self, _: &(), ctx: &ActionContext, request: SleepRequest) -> anyhow::Result<Value> {
        ctx.emit(ctx.event(EventKind::Sleep).with_field("duration_ms", request.duration_ms));
        tokio::time::sleep(Duration::from_millis(request.duration_ms)).await;
        Ok(json!({}))
    }
}

/// Stops the run; recovery bindings do not apply
pub struct Stop;

#[async_trait]
impl Handler for Stop {
    type Client = ();
    type Request = MessageRequest;
    type Response = Value;

    async fn handle(&self, _: &(), _: &ActionContext, request: MessageRequest) -> anyhow::Result<Value> {
        Err(RunbookError::Stopped {
            reason: request.message,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_stop_is_fatal() {
        let ctx = ActionContext::detached("workflow.fail");
        let err = Stop
            .handle(&(), &ctx, MessageRequest { message: "halt".into() })
            .await
            .unwrap_err();
        let err = err.downcast::<RunbookError>().unwrap();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[tokio::test]
    async fn test_sleep_zero_returns() {
        let ctx = ActionContext::detached("workflow.sleep");
        let response = Sleep
            .handle(&(), &ctx, SleepRequest { duration_ms: 0 })
            .await
            .unwrap();
        assert_eq!(response, json!({}));
    }
}
