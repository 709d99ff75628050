use crate::error::Result;
use crate::mcp::{ConnectionSpec, JsonObject};
use async_trait::async_trait;
use serde_json::Value;

/// An established session with one child MCP server.
///
/// Each session is driven by a single worker task, so implementations never
/// see two requests at once.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Full tool catalog, one JSON descriptor per tool
    async fn list_tools(&self) -> Result<Vec<Value>>;

    /// Invoke a tool and return the server's result document untouched
    async fn call_tool(&self, tool: &str, arguments: JsonObject) -> Result<Value>;

    /// Shut the session down and release the child process
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions from launch parameters
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, name: &str, spec: &ConnectionSpec) -> Result<Box<dyn ToolSession>>;
}
