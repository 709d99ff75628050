use super::traits::{Connector, ToolSession};
use crate::error::{HubError, Result};
use crate::mcp::{ConnectionSpec, JsonObject};
use async_trait::async_trait;
use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParams, PaginatedRequestParams};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default timeout for MCP handshake initialization.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Spawns each child as a process speaking MCP over its stdin/stdout
#[derive(Debug, Clone)]
pub struct StdioConnector {
    handshake_timeout: Duration,
}

impl StdioConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self::new(HANDSHAKE_TIMEOUT)
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(&self, name: &str, spec: &ConnectionSpec) -> Result<Box<dyn ToolSession>> {
        let transport = TokioChildProcess::new(build_command(spec)).map_err(|e| {
            error!("Failed to spawn {} ({}): {}", name, spec.command, e);
            HubError::transport(name, format!("failed to spawn '{}': {}", spec.command, e))
        })?;

        let ct = CancellationToken::new();
        let service = tokio::time::timeout(
            self.handshake_timeout,
            ().serve_with_ct(transport, ct.clone()),
        )
        .await
        .map_err(|_| {
            ct.cancel();
            HubError::timeout(name, "handshake", self.handshake_timeout)
        })?
        .map_err(|e| HubError::transport(name, format!("handshake failed: {}", e)))?;

        info!("MCP handshake completed for server: {}", name);
        Ok(Box::new(RmcpSession {
            name: name.to_string(),
            service,
        }))
    }
}

/// The child inherits the hub's environment; `spec.env` entries win on collisions
fn build_command(spec: &ConnectionSpec) -> Command {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args).envs(&spec.env);
    cmd
}

/// A running rmcp client bound to one child process
struct RmcpSession {
    name: String,
    service: RunningService<RoleClient, ()>,
}

#[async_trait]
impl ToolSession for RmcpSession {
    async fn list_tools(&self) -> Result<Vec<Value>> {
        let mut tool_list = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let request = Some(PaginatedRequestParams {
                meta: None,
                cursor: cursor.clone(),
            });

            let result = self.service.list_tools(request).await.map_err(|e| {
                error!("Failed to list tools for {}: {}", self.name, e);
                HubError::transport(&self.name, format!("list tools: {}", e))
            })?;

            for tool in result.tools {
                tool_list.push(serde_json::to_value(&tool)?);
            }

            cursor = result.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        debug!("Found {} tools for server: {}", tool_list.len(), self.name);
        Ok(tool_list)
    }

    async fn call_tool(&self, tool: &str, arguments: JsonObject) -> Result<Value> {
        let request = CallToolRequestParams {
            meta: None,
            name: tool.to_string().into(),
            arguments: Some(arguments),
            task: None,
        };

        let result = self.service.call_tool(request).await.map_err(|e| {
            error!("Failed to call tool '{}' on {}: {}", tool, self.name, e);
            HubError::transport(&self.name, format!("call tool '{}': {}", tool, e))
        })?;

        Ok(serde_json::to_value(&result)?)
    }

    async fn close(&mut self) -> Result<()> {
        self.service
            .close()
            .await
            .map(|_| ())
            .map_err(|e| HubError::transport(&self.name, format!("close: {}", e)))
    }
}
