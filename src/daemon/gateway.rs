//! Agent session gateway abstraction and its HTTP client.
//!
//! The [`SessionGateway`] trait is the daemon's only way to reach live agent
//! sessions. [`HttpGateway`] talks to the gateway's `/tools/invoke` endpoint;
//! tests substitute a scripted implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{AppError, Result};

/// Gateway tool invoked by the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayTool {
    /// Post a message into an existing session and await its reply.
    #[serde(rename = "sessions_send")]
    SessionsSend,
    /// Start a bounded sub-session that works on its own.
    #[serde(rename = "sessions_spawn")]
    SessionsSpawn,
}

/// One tool invocation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    /// Tool to run.
    pub tool: GatewayTool,
    /// Tool arguments.
    pub args: Value,
    /// Session on whose behalf a spawn runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

impl GatewayRequest {
    /// `sessions_send` into `session_key`.
    #[must_use]
    pub fn send(session_key: &str, message: &str) -> Self {
        Self {
            tool: GatewayTool::SessionsSend,
            args: json!({ "sessionKey": session_key, "message": message }),
            session_key: None,
        }
    }

    /// `sessions_spawn` of a sub-session for `agent_id`.
    #[must_use]
    pub fn spawn(agent_id: &str, session_key: &str, task: &str, run_timeout_seconds: u64) -> Self {
        Self {
            tool: GatewayTool::SessionsSpawn,
            args: json!({
                "agentId": agent_id,
                "task": task,
                "runTimeoutSeconds": run_timeout_seconds,
            }),
            session_key: Some(session_key.to_owned()),
        }
    }
}

/// Gateway response envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayResponse {
    /// Whether the tool ran.
    #[serde(default)]
    pub ok: bool,
    /// Tool-specific result payload.
    #[serde(default)]
    pub result: Value,
    /// Error text when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl GatewayResponse {
    /// Whether a spawn was accepted (`result.details.status == "accepted"`).
    #[must_use]
    pub fn spawn_accepted(&self) -> bool {
        self.ok
            && self
                .result
                .pointer("/details/status")
                .and_then(Value::as_str)
                == Some("accepted")
    }
}

/// Outbound interface to live agent sessions.
pub trait SessionGateway: Send + Sync {
    /// Invoke a gateway tool, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Timeout`] when `timeout` elapses and
    /// [`AppError::Gateway`] for transport errors and non-2xx statuses. A 2xx
    /// with an empty or non-JSON body is a default (`ok: false`) response.
    fn invoke(
        &self,
        request: GatewayRequest,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayResponse>> + Send + '_>>;
}

/// [`SessionGateway`] over HTTP.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpGateway {
    /// Build a client for the gateway at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/tools/invoke", base_url.trim_end_matches('/')),
            token: token.into(),
        }
    }

    async fn post(&self, request: GatewayRequest, timeout: Duration) -> Result<GatewayResponse> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&request);
        if !self.token.is_empty() {
            builder = builder.bearer_auth(&self.token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), tool = ?request.tool, "gateway responded");

        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "gateway returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        if body.trim().is_empty() {
            return Ok(GatewayResponse::default());
        }
        match serde_json::from_str(&body) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                warn!(%err, tool = ?request.tool, "gateway answered 2xx with a non-JSON body");
                Ok(GatewayResponse::default())
            }
        }
    }
}

impl SessionGateway for HttpGateway {
    fn invoke(
        &self,
        request: GatewayRequest,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayResponse>> + Send + '_>> {
        Box::pin(self.post(request, timeout))
    }
}
