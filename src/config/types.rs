use crate::mcp::ConnectionSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The server document: `{"mcpServers": {...}, "globalFilters": {...}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubDocument {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, ServerConfig>,
    #[serde(rename = "globalFilters", default)]
    pub global_filters: Option<ToolFilter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub filters: Option<ToolFilter>,
}

impl ServerConfig {
    pub fn to_spec(&self) -> ConnectionSpec {
        ConnectionSpec {
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
        }
    }
}

/// Include/exclude pattern lists controlling tool discoverability
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ToolFilter {
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

impl ToolFilter {
    /// Build a filter from command-line pattern lists; empty lists become absent
    pub fn from_patterns(include: Vec<String>, exclude: Vec<String>) -> Option<Self> {
        let include = non_empty(include);
        let exclude = non_empty(exclude);
        if include.is_none() && exclude.is_none() {
            return None;
        }
        Some(Self { include, exclude })
    }

    /// Append `other`'s patterns after our own
    pub fn merge(&mut self, other: &ToolFilter) {
        extend(&mut self.include, &other.include);
        extend(&mut self.exclude, &other.exclude);
    }
}

fn non_empty(patterns: Vec<String>) -> Option<Vec<String>> {
    let patterns: Vec<String> = patterns
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    (!patterns.is_empty()).then_some(patterns)
}

fn extend(target: &mut Option<Vec<String>>, source: &Option<Vec<String>>) {
    if let Some(source) = source {
        target.get_or_insert_with(Vec::new).extend(source.iter().cloned());
    }
}

/// Runtime settings for the hub process itself
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubSettings {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_handshake_secs")]
    pub handshake_secs: u64,
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_secs: default_handshake_secs(),
            request_secs: default_request_secs(),
            shutdown_secs: default_shutdown_secs(),
        }
    }
}

fn default_handshake_secs() -> u64 {
    30
}

fn default_request_secs() -> u64 {
    60
}

fn default_shutdown_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}
