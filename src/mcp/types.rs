use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Arguments object forwarded to a tool call
pub type JsonObject = serde_json::Map<String, Value>;

/// Launch parameters for one child MCP server.
///
/// `env` entries are layered on top of the hub's own environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ConnectionSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Wrap raw tool descriptors in the `{"tools": [...]}` listing shape
pub(crate) fn tool_listing(tools: Vec<Value>) -> Value {
    serde_json::json!({ "tools": tools })
}
