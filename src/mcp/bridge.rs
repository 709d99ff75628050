// MCP server face of the hub: two tools that list the aggregated catalog and
// forward calls to a named child server.

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::JsonObject;
use crate::endpoint::HubManager;

pub(crate) const LIST_ALL_TOOLS: &str = "list_all_tools";
pub(crate) const CALL_TOOL: &str = "call_tool";

#[derive(Clone)]
pub(crate) struct HubBridge {
    manager: HubManager,
}

impl HubBridge {
    pub(crate) fn new(manager: HubManager) -> Self {
        Self { manager }
    }

    fn tools() -> Vec<Tool> {
        vec![
            Tool::new(
                LIST_ALL_TOOLS,
                "List the tools of every connected MCP server, keyed by server name",
                schema(json!({
                    "type": "object",
                    "properties": {},
                })),
            ),
            Tool::new(
                CALL_TOOL,
                "Call a tool on one of the connected MCP servers",
                schema(json!({
                    "type": "object",
                    "properties": {
                        "server": {"type": "string", "description": "Connection name"},
                        "tool": {"type": "string", "description": "Tool name on that server"},
                        "arguments": {"type": "object", "description": "Tool arguments"},
                    },
                    "required": ["server", "tool"],
                })),
            ),
        ]
    }

    pub(crate) async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        match name {
            LIST_ALL_TOOLS => Ok(self.list_all_tools().await),
            CALL_TOOL => self.forward_call(arguments.unwrap_or_default()).await,
            other => Err(McpError::invalid_params(
                format!("Unknown tool: {}", other),
                None,
            )),
        }
    }

    async fn list_all_tools(&self) -> CallToolResult {
        let listings = self.manager.list_all_tools().await;

        let mut servers = Map::new();
        for (name, listing) in listings {
            let entry = match listing {
                Ok(listing) => listing,
                Err(e) => json!({ "error": e.to_descriptor() }),
            };
            servers.insert(name, entry);
        }

        CallToolResult::success(vec![Content::text(Value::Object(servers).to_string())])
    }

    async fn forward_call(&self, mut arguments: JsonObject) -> Result<CallToolResult, McpError> {
        let server = required_string(&arguments, "server")?;
        let tool = required_string(&arguments, "tool")?;
        let tool_arguments = match arguments.remove("arguments") {
            None | Some(Value::Null) => JsonObject::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(McpError::invalid_params(
                    "'arguments' must be an object",
                    None,
                ));
            }
        };

        debug!("Forwarding tool '{}' to server: {}", tool, server);

        match self.manager.call_tool(&server, &tool, tool_arguments).await {
            Ok(result) => Ok(forward_result(result)),
            Err(e) => {
                warn!("Tool call '{}' on {} failed: {}", tool, server, e);
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

fn schema(value: Value) -> Arc<JsonObject> {
    Arc::new(value.as_object().cloned().unwrap_or_default())
}

fn required_string(arguments: &JsonObject, key: &str) -> Result<String, McpError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| McpError::invalid_params(format!("'{}' must be a string", key), None))
}

/// Hand the child's result back unchanged when it parses as a tool result
fn forward_result(result: Value) -> CallToolResult {
    match serde_json::from_value::<CallToolResult>(result.clone()) {
        Ok(parsed) => parsed,
        Err(_) => CallToolResult::success(vec![Content::text(result.to_string())]),
    }
}

impl ServerHandler for HubBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Aggregates several MCP servers. Use list_all_tools to discover tools, \
                 then call_tool with the server name."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            meta: None,
            tools: Self::tools(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Hub received call for: {}", params.name);
        self.dispatch(&params.name, params.arguments).await
    }
}
