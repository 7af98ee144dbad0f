//! `exec` service: local process execution

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::event::EventKind;
use crate::service::{ActionContext, Handler, Service, ServiceBuilder};
use crate::util::EXEC_TIMEOUT;

pub fn service() -> Result<Service> {
    ServiceBuilder::new("exec").verb("run", Run).bind(())
}

pub struct Run;

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Fail the action on a non-zero exit code
    #[serde(default)]
    pub check_error: bool,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecResponse {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

#[async_trait]
impl Handler for Run {
    type Client = ();
    type Request = ExecRequest;
    type Response = ExecResponse;

    async fn handle(
        &self,
        _: &(),
        ctx: &ActionContext,
        request: ExecRequest,
    ) -> anyhow::Result<ExecResponse> {
        let command_line = std::iter::once(request.command.as_str())
            .chain(request.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        ctx.emit(ctx.event(EventKind::Stdin).with_field("stdin", command_line.as_str()));

        let mut command = tokio::process::Command::new(&request.command);
        command.args(&request.args).kill_on_drop(true);
        if let Some(dir) = &request.dir {
            command.current_dir(dir);
        }

        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(EXEC_TIMEOUT);
        debug!(command = %command_line, ?timeout, "spawning process");

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| anyhow::anyhow!("command timed out after {}ms", timeout.as_millis()))?
            .with_context(|| format!("failed to execute '{}'", request.command))?;

        let response = ExecResponse {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        };
        ctx.emit(
            ctx.event(EventKind::Stdout)
                .with_field("stdout", response.stdout.as_str())
                .with_field("code", response.code),
        );

        if request.check_error && response.code != 0 {
            bail!(
                "command '{}' exited with code {}: {}",
                command_line,
                response.code,
                response.stderr.trim()
            );
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &str, args: &[&str], check_error: bool) -> ExecRequest {
        ExecRequest {
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            dir: None,
            timeout_ms: None,
            check_error,
        }
    }

    #[tokio::test]
    async fn test_echo_captures_stdout() {
        let ctx = ActionContext::detached("exec.run");
        let response = Run
            .handle(&(), &ctx, request("echo", &["hello"], true))
            .await
            .unwrap();
        assert_eq!(response.stdout.trim(), "hello");
        assert_eq!(response.code, 0);
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let ctx = ActionContext::detached("exec.run");
        let response = Run
            .handle(&(), &ctx, request("sh", &["-c", "exit 3"], false))
            .await
            .unwrap();
        assert_eq!(response.code, 3);

        let err = Run
            .handle(&(), &ctx, request("sh", &["-c", "exit 3"], true))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with code 3"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let ctx = ActionContext::detached("exec.run");
        let mut req = request("sleep", &["5"], false);
        req.timeout_ms = Some(50);
        let err = Run.handle(&(), &ctx, req).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
