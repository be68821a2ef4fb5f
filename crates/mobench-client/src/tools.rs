//! Tool client for external MCP-style tool servers.
//!
//! The agent loop is synchronous with respect to tools: one `mcp` action in,
//! one [`ToolCallResult`] out. Failures are folded into the result so the
//! benchmark loop never aborts on a bad tool call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use mobench_core::ToolCallResult;

/// Errors from the tool transport.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Transport-level failure.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a JSON-RPC error object.
    #[error("Tool server error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response did not decode.
    #[error("Failed to decode tool response: {0}")]
    Decode(String),
}

/// One advertised tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    /// Tool name, used as the `mcp` action's `action_name`.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// Transport seam for tool servers.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// List the tools the server advertises.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError>;

    /// Invoke one tool with JSON arguments.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError>;
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ToolListResult {
    tools: Vec<ToolSpec>,
}

/// JSON-RPC 2.0 tool backend over HTTP.
pub struct HttpToolBackend {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl HttpToolBackend {
    /// Build a backend for one tool server endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response: RpcResponse = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(ToolError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| ToolError::Decode("missing result".to_string()))
    }
}

#[async_trait]
impl ToolBackend for HttpToolBackend {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        let result = self.rpc("tools/list", json!({})).await?;
        let list: ToolListResult =
            serde_json::from_value(result).map_err(|e| ToolError::Decode(e.to_string()))?;
        Ok(list.tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        self.rpc("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }
}

/// Synchronous-facing tool client over a [`ToolBackend`].
///
/// Holds the set of tools the active task may use; calls outside that set
/// come back as [`ToolCallResult::Failure`].
pub struct ToolClient<B: ToolBackend> {
    backend: B,
    tools: BTreeMap<String, ToolSpec>,
}

impl<B: ToolBackend> ToolClient<B> {
    /// Build a client with an empty tool set. Call [`refresh`] to populate.
    ///
    /// [`refresh`]: ToolClient::refresh
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            tools: BTreeMap::new(),
        }
    }

    /// Re-list tools from the backend, keeping only those in `allowed`
    /// (all of them when `allowed` is `None`).
    pub async fn refresh(&mut self, allowed: Option<&BTreeSet<String>>) -> Result<(), ToolError> {
        let specs = self.backend.list_tools().await?;
        self.tools = specs
            .into_iter()
            .filter(|spec| allowed.map_or(true, |set| set.contains(&spec.name)))
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        debug!(count = self.tools.len(), "Tool set refreshed");
        Ok(())
    }

    /// Drop every tool; subsequent calls fail as unknown.
    pub fn clear(&mut self) {
        self.tools.clear();
    }

    /// Tools currently available to the agent.
    pub fn available(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    /// Invoke one tool. Never errors: unknown tools and backend faults are
    /// folded into a failure result.
    pub async fn call(&self, name: &str, arguments: Value) -> ToolCallResult {
        if !self.tools.contains_key(name) {
            return ToolCallResult::Failure {
                name: name.to_string(),
                message: format!("unknown tool: {name}"),
            };
        }
        match self.backend.call_tool(name, arguments).await {
            Ok(content) => ToolCallResult::Success {
                name: name.to_string(),
                content,
            },
            Err(error) => {
                warn!(tool = %name, error = %error, "Tool call failed");
                ToolCallResult::Failure {
                    name: name.to_string(),
                    message: error.to_string(),
                }
            }
        }
    }
}
