//! `http` service: sends a sequence of requests through a shared client

use anyhow::Context;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Result, RunbookError};
use crate::event::EventKind;
use crate::service::{ActionContext, Handler, Service, ServiceBuilder};
use crate::state::value_to_string;
use crate::util::{CONNECT_TIMEOUT, HTTP_TIMEOUT, REDIRECT_LIMIT};

/// Shared client (connection pooling across sessions)
pub fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
        .user_agent(concat!("runbook/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RunbookError::ConfigError {
            reason: format!("cannot build HTTP client: {}", e),
        })
}

pub fn service() -> Result<Service> {
    ServiceBuilder::new("http").verb("send", HttpSend).bind(client()?)
}

pub struct HttpSend;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub requests: Vec<HttpRequest>,
}

#[derive(Debug, Deserialize)]
pub struct HttpRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: FxHashMap<String, String>,
    /// Strings are sent as-is, other values as JSON
    #[serde(default)]
    pub body: Value,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub responses: Vec<HttpResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HttpResponse {
    pub code: u16,
    pub headers: FxHashMap<String, String>,
    /// JSON when the body parses as JSON, text otherwise
    pub body: Value,
}

#[async_trait]
impl Handler for HttpSend {
    type Client = reqwest::Client;
    type Request = SendRequest;
    type Response = SendResponse;

    async fn handle(
        &self,
        client: &reqwest::Client,
        ctx: &ActionContext,
        request: SendRequest,
    ) -> anyhow::Result<SendResponse> {
        let mut responses = Vec::with_capacity(request.requests.len());
        for req in request.requests {
            responses.push(send_one(client, ctx, req).await?);
        }
        Ok(SendResponse { responses })
    }
}

async fn send_one(
    client: &reqwest::Client,
    ctx: &ActionContext,
    req: HttpRequest,
) -> anyhow::Result<HttpResponse> {
    let url = Url::parse(&req.url).with_context(|| format!("invalid url '{}'", req.url))?;
    let method = reqwest::Method::from_bytes(req.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method '{}'", req.method))?;

    ctx.emit(
        ctx.event(EventKind::HttpRequest)
            .with_field("method", method.as_str())
            .with_field("url", url.as_str()),
    );

    let mut builder = client.request(method, url.clone());
    for (name, value) in &req.headers {
        builder = builder.header(name, value);
    }
    if !req.body.is_null() {
        builder = builder.body(value_to_string(&req.body).into_owned());
    }

    let response = builder
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;
    let code = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let text = response.text().await.context("failed to read response body")?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

    ctx.emit(
        ctx.event(EventKind::HttpResponse)
            .with_field("url", url.as_str())
            .with_field("code", code),
    );

    Ok(HttpResponse {
        code,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_json_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(header("x-token", "abc"))
            .and(body_string(r#"{"name":"bob"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let request: SendRequest = serde_json::from_value(json!({
            "requests": [
                {
                    "method": "post",
                    "url": format!("{}/users", server.uri()),
                    "headers": {"x-token": "abc"},
                    "body": {"name": "bob"}
                },
                {"url": format!("{}/ping", server.uri())}
            ]
        }))
        .unwrap();

        let ctx = ActionContext::detached("http.send");
        let response = HttpSend.handle(&client().unwrap(), &ctx, request).await.unwrap();
        assert_eq!(response.responses[0].code, 201);
        assert_eq!(response.responses[0].body, json!({"id": 7}));
        assert_eq!(response.responses[1].body, json!("pong"));
    }

    #[tokio::test]
    async fn test_invalid_url_fails() {
        let request: SendRequest =
            serde_json::from_value(json!({"requests": [{"url": "not a url"}]})).unwrap();
        let ctx = ActionContext::detached("http.send");
        let err = HttpSend
            .handle(&client().unwrap(), &ctx, request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid url"));
    }
}
