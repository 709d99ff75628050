use async_trait::async_trait;
use axum::Router;
use mcp_hub::config::ToolFilter;
use mcp_hub::endpoint::{Connector, HubManager, HubTimeouts, ToolSession};
use mcp_hub::{ConnectionSpec, HubError, JsonObject, Result};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ──────────────────────────────────────────────
// Scripted child servers (no real processes)
// ──────────────────────────────────────────────

pub fn tools(names: &[&str]) -> Vec<Value> {
    names
        .iter()
        .map(|name| json!({"name": name, "description": format!("{} tool", name)}))
        .collect()
}

struct ScriptedSession {
    name: String,
    tools: Vec<Value>,
}

#[async_trait]
impl ToolSession for ScriptedSession {
    async fn list_tools(&self) -> Result<Vec<Value>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, tool: &str, arguments: JsonObject) -> Result<Value> {
        let echo = json!({"server": self.name, "tool": tool, "arguments": arguments});
        Ok(json!({
            "content": [{"type": "text", "text": echo.to_string()}],
            "structuredContent": echo,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Connects by command name: each known command serves a fixed catalog,
/// anything else fails like a missing executable.
#[derive(Default)]
pub struct ScriptedConnector {
    catalogs: HashMap<String, Vec<Value>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(mut self, command: &str, tools: Vec<Value>) -> Self {
        self.catalogs.insert(command.to_string(), tools);
        self
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, name: &str, spec: &ConnectionSpec) -> Result<Box<dyn ToolSession>> {
        let tools = self
            .catalogs
            .get(&spec.command)
            .cloned()
            .ok_or_else(|| HubError::Transport {
                name: name.to_string(),
                message: format!("failed to spawn '{}'", spec.command),
            })?;

        Ok(Box::new(ScriptedSession {
            name: name.to_string(),
            tools,
        }))
    }
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

/// Connector knowing `fs-server` and `git-server`; `broken-server` is left unknown
pub fn default_connector() -> ScriptedConnector {
    ScriptedConnector::new()
        .command(
            "fs-server",
            tools(&["read_file", "write_file", "delete_file", "list_dir"]),
        )
        .command("git-server", tools(&["git.log", "git.status", "git.push"]))
}

pub fn build_manager(global: Option<ToolFilter>) -> HubManager {
    HubManager::with_timeouts(
        Arc::new(default_connector()),
        global,
        HubTimeouts {
            request: Duration::from_secs(2),
            shutdown: Duration::from_secs(2),
        },
    )
}

/// Build a test Router around `manager` (no HTTP server, uses tower::oneshot).
pub fn build_test_app(manager: HubManager) -> Router {
    mcp_hub::api::build_router(manager, CancellationToken::new())
}

pub fn tool_names(listing: &Value) -> Vec<String> {
    listing["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

/// Helper to extract JSON from a response body.
pub async fn response_json(response: axum::http::Response<axum::body::Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
