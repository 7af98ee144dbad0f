//! Handler trait and its type-erased form
//!
//! Every verb is a typed `Handler`; the registry stores it erased so one
//! map can hold verbs with different request, response and client types.
//! Decoding and client checks happen once, at this boundary.

use std::any::{Any, TypeId};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, RunbookError};

use super::context::ActionContext;

/// A single service verb
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Backing client the verb talks through (`()` when none)
    type Client: Send + Sync + 'static;
    type Request: DeserializeOwned + Send;
    type Response: Serialize + Send;

    async fn handle(
        &self,
        client: &Self::Client,
        ctx: &ActionContext,
        request: Self::Request,
    ) -> anyhow::Result<Self::Response>;
}

#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    fn client_type(&self) -> TypeId;

    fn client_type_name(&self) -> &'static str;

    async fn call(
        &self,
        client: &(dyn Any + Send + Sync),
        ctx: &ActionContext,
        request: Value,
    ) -> Result<Value>;
}

pub(crate) struct Erased<H>(pub(crate) H);

#[async_trait]
impl<H: Handler> ErasedHandler for Erased<H> {
    fn client_type(&self) -> TypeId {
        TypeId::of::<H::Client>()
    }

    fn client_type_name(&self) -> &'static str {
        std::any::type_name::<H::Client>()
    }

    async fn call(
        &self,
        client: &(dyn Any + Send + Sync),
        ctx: &ActionContext,
        request: Value,
    ) -> Result<Value> {
        let client =
            client
                .downcast_ref::<H::Client>()
                .ok_or_else(|| RunbookError::ClientMismatch {
                    service: ctx.action.to_string(),
                    expected: self.client_type_name().to_string(),
                })?;

        // An omitted request decodes as an empty object
        let request = match request {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let request: H::Request =
            serde_json::from_value(request).map_err(|e| RunbookError::RequestDecode {
                action: ctx.action.to_string(),
                reason: e.to_string(),
            })?;

        let response = self
            .0
            .handle(client, ctx, request)
            .await
            .map_err(|e| into_runbook_error(&ctx.action, e))?;

        serde_json::to_value(response).map_err(|e| RunbookError::ActionFailed {
            action: ctx.action.to_string(),
            reason: format!("response is not serializable: {}", e),
        })
    }
}

/// Keep engine errors raised inside a handler, wrap everything else
fn into_runbook_error(action: &str, err: anyhow::Error) -> RunbookError {
    match err.downcast::<RunbookError>() {
        Ok(err) => err,
        Err(err) => RunbookError::ActionFailed {
            action: action.to_string(),
            reason: format!("{:#}", err),
        },
    }
}
