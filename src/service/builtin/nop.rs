//! `nop` service: no-op, echo and failure verbs for wiring and tests

use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::service::{ActionContext, Handler, Service, ServiceBuilder};

pub fn service() -> Result<Service> {
    ServiceBuilder::new("nop")
        .verb("nop", Nop)
        .verb("parrot", Parrot)
        .verb("fail", Fail)
        .bind(())
}

pub struct Nop;

#[derive(Debug, Deserialize)]
pub struct NopRequest {}

#[async_trait]
impl Handler for Nop {
    type Client = ();
    type Request = NopRequest;
    type Response = Value;

    async fn handle(&self, _: &(), _: &ActionContext, _: NopRequest) -> anyhow::Result<Value> {
        Ok(json!({}))
    }
}

/// Echoes `in` back as the response
pub struct Parrot;

#[derive(Debug, Deserialize)]
pub struct ParrotRequest {
    #[serde(rename = "in", default)]
    pub input: Value,
}

#[async_trait]
impl Handler for Parrot {
    type Client = ();
    type Request = ParrotRequest;
    type Response = Value;

    async fn handle(
        &self,
        _: &(),
        _: &ActionContext,
        request: ParrotRequest,
    ) -> anyhow::Result<Value> {
        Ok(request.input)
    }
}

pub struct Fail;

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    #[serde(default)]
    pub message: String,
}

#[async_trait]
impl Handler for Fail {
    type Client = ();
    type Request = FailRequest;
    type Response = Value;

    async fn handle(&self, _: &(), _: &ActionContext, request: FailRequest) -> anyhow::Result<Value> {
        bail!("{}", request.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parrot_echoes_input() {
        let ctx = ActionContext::detached("nop.parrot");
        let request: ParrotRequest = serde_json::from_value(json!({"in": {"r": "test 1"}})).unwrap();
        assert_eq!(
            Parrot.handle(&(), &ctx, request).await.unwrap(),
            json!({"r": "test 1"})
        );
    }

    #[tokio::test]
    async fn test_fail_carries_message() {
        let ctx = ActionContext::detached("nop.fail");
        let err = Fail
            .handle(&(), &ctx, FailRequest { message: "this is test error 1".into() })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "this is test error 1");
    }
}
