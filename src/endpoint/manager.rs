use super::registry::{ConnectionRegistry, ConnectionState};
use super::traits::Connector;
use crate::config::{self, HubDocument, TimeoutConfig, ToolFilter};
use crate::error::{HubError, Result};
use crate::mcp::types::tool_listing;
use crate::mcp::{ConnectionSpec, JsonObject};
use crate::routing::{CompiledFilter, apply_filters};
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct HubTimeouts {
    /// Bound on a single `list_tools`/`call_tool` against one connection
    pub request: Duration,
    /// Bound on closing one connection
    pub shutdown: Duration,
}

impl Default for HubTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for HubTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            request: Duration::from_secs(config.request_secs),
            shutdown: Duration::from_secs(config.shutdown_secs),
        }
    }
}

/// Outcome of loading a server document
#[derive(Debug, Default)]
pub struct LoadReport {
    pub connected: Vec<String>,
    /// Names that were already registered and left alone
    pub skipped: Vec<String>,
    pub failed: BTreeMap<String, HubError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-connection result of `list_all_tools`
pub type ToolListings = BTreeMap<String, Result<Value>>;

/// The base rule set (construction or `set_global_filter`) plus the
/// `globalFilters` of the most recently loaded document
#[derive(Default)]
struct GlobalRules {
    base: Option<ToolFilter>,
    document: Option<ToolFilter>,
    compiled: Option<CompiledFilter>,
}

impl GlobalRules {
    fn new(base: Option<ToolFilter>) -> Self {
        let mut rules = Self {
            base,
            ..Default::default()
        };
        rules.recompile();
        rules
    }

    fn recompile(&mut self) {
        self.compiled = match (&self.base, &self.document) {
            (None, None) => None,
            (base, document) => {
                let mut merged = base.clone().unwrap_or_default();
                if let Some(document) = document {
                    merged.merge(document);
                }
                Some(CompiledFilter::new(merged))
            }
        };
    }
}

/// Aggregates all child servers: loading, catalog listing with filters, call dispatch
#[derive(Clone)]
pub struct HubManager {
    registry: ConnectionRegistry,
    global_rules: Arc<RwLock<GlobalRules>>,
    request_timeout: Duration,
}

impl HubManager {
    pub fn new(connector: Arc<dyn Connector>, global_filter: Option<ToolFilter>) -> Self {
        Self::with_timeouts(connector, global_filter, HubTimeouts::default())
    }

    pub fn with_timeouts(
        connector: Arc<dyn Connector>,
        global_filter: Option<ToolFilter>,
        timeouts: HubTimeouts,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(connector, timeouts.shutdown),
            global_rules: Arc::new(RwLock::new(GlobalRules::new(global_filter))),
            request_timeout: timeouts.request,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Read a server document from disk and connect everything in it
    pub async fn load_from_configuration<P: AsRef<Path>>(&self, path: P) -> Result<LoadReport> {
        let document = config::load_document(path)?;
        Ok(self.load_document(document).await)
    }

    /// Connect every server in `document` that is not registered yet.
    ///
    /// Connections are attempted concurrently; failures are collected, not raised.
    pub async fn load_document(&self, document: HubDocument) -> LoadReport {
        self.replace_document_filter(document.global_filters).await;

        info!(
            "Initializing {} MCP servers from configuration",
            document.mcp_servers.len()
        );

        let mut report = LoadReport::default();
        let mut pending = Vec::new();
        for (name, server) in document.mcp_servers {
            if self.registry.state(&name) != ConnectionState::Absent {
                debug!("Skipping already registered server: {}", name);
                report.skipped.push(name);
                continue;
            }
            let spec = server.to_spec();
            pending.push((name, spec, server.filters));
        }

        let attempts = pending
            .iter()
            .map(|(name, spec, filter)| self.registry.connect(name, spec, filter.clone()));
        let results = join_all(attempts).await;

        for ((name, _, _), result) in pending.into_iter().zip(results) {
            match result {
                Ok(()) => report.connected.push(name),
                Err(e) => {
                    error!("Failed to start MCP server {}: {}", name, e);
                    report.failed.insert(name, e);
                }
            }
        }

        info!(
            "Configuration loaded: {} connected, {} skipped, {} failed",
            report.connected.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    pub async fn connect(
        &self,
        name: &str,
        spec: &ConnectionSpec,
        filter: Option<ToolFilter>,
    ) -> Result<()> {
        self.registry.connect(name, spec, filter).await
    }

    pub async fn disconnect(&self, name: &str) -> Result<()> {
        self.registry.disconnect(name).await
    }

    pub async fn disconnect_all(&self) -> Result<()> {
        self.registry.disconnect_all().await
    }

    pub fn list_connections(&self) -> Vec<String> {
        self.registry.list_names()
    }

    /// Effective global rule set: base patterns first, then the document's
    pub async fn global_filter(&self) -> Option<ToolFilter> {
        self.global_rules
            .read()
            .await
            .compiled
            .as_ref()
            .map(|f| f.source().clone())
    }

    /// Replace the global rule set outright, dropping any document contribution
    pub async fn set_global_filter(&self, filter: Option<ToolFilter>) {
        let mut rules = self.global_rules.write().await;
        rules.base = filter;
        rules.document = None;
        rules.recompile();
    }

    async fn replace_document_filter(&self, document: Option<ToolFilter>) {
        let mut rules = self.global_rules.write().await;
        rules.document = document;
        rules.recompile();
    }

    /// Filtered catalog of one connection as `{"tools": [...]}`
    pub async fn list_tools(&self, name: &str) -> Result<Value> {
        let connection = self.registry.resolve(name)?;

        let tools = tokio::time::timeout(self.request_timeout, connection.list_tools())
            .await
            .map_err(|_| HubError::timeout(name, "list tools", self.request_timeout))??;
        let total = tools.len();

        let global = self.global_rules.read().await.compiled.clone();
        let listing = apply_filters(&tool_listing(tools), connection.filter(), global.as_ref());

        debug!(
            "Listed {} of {} tools for server: {}",
            listing["tools"].as_array().map_or(0, Vec::len),
            total,
            name
        );
        Ok(listing)
    }

    /// Filtered catalogs of every connection, queried concurrently
    pub async fn list_all_tools(&self) -> ToolListings {
        let names = self.registry.list_names();
        let results = join_all(names.iter().map(|name| self.list_tools(name))).await;

        names
            .into_iter()
            .zip(results)
            .inspect(|(name, result)| {
                if let Err(e) = result {
                    warn!("Failed to list tools for {}: {}", name, e);
                }
            })
            .collect()
    }

    /// Forward a tool call as-is; filters only affect listings
    pub async fn call_tool(&self, name: &str, tool: &str, arguments: JsonObject) -> Result<Value> {
        let connection = self.registry.resolve(name)?;

        tokio::time::timeout(self.request_timeout, connection.call_tool(tool, arguments))
            .await
            .map_err(|_| HubError::timeout(name, "call tool", self.request_timeout))?
    }
}
