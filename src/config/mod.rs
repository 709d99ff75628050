pub mod types;

use crate::error::{HubError, Result};
use anyhow::Context;
use config::{Config, Environment, File};
use std::path::Path;
pub use types::*;

/// Prefix for environment overrides of hub settings, e.g. `MCP_HUB__TIMEOUTS__REQUEST_SECS`
const ENV_PREFIX: &str = "MCP_HUB";

/// Load the server document (`mcpServers` / `globalFilters`) from a JSON file
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<HubDocument> {
    let path = path.as_ref();

    let raw = std::fs::read_to_string(path)
        .map_err(|e| HubError::config(format!("{}: {}", path.display(), e)))?;

    parse_document(&raw).map_err(|e| match e {
        HubError::ConfigurationLoadFailure(msg) => {
            HubError::config(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Parse and validate a server document
pub fn parse_document(raw: &str) -> Result<HubDocument> {
    let document: HubDocument = serde_json::from_str(raw).map_err(HubError::config)?;
    validate_document(&document)?;
    Ok(document)
}

fn validate_document(document: &HubDocument) -> Result<()> {
    for (name, server) in &document.mcp_servers {
        if name.trim().is_empty() {
            return Err(HubError::config("server name must not be empty"));
        }
        if server.command.trim().is_empty() {
            return Err(HubError::config(format!(
                "server '{}' has an empty command",
                name
            )));
        }
    }

    Ok(())
}

/// Load hub settings from an optional TOML file, overridden by `MCP_HUB__*` variables
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<HubSettings> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to load hub settings")?;

    let settings: HubSettings = config
        .try_deserialize()
        .context("Failed to deserialize hub settings")?;

    validate_settings(&settings)?;

    Ok(settings)
}

fn validate_settings(settings: &HubSettings) -> anyhow::Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&settings.logging.level.as_str()) {
        anyhow::bail!(
            "Invalid log level '{}'. Valid levels: {}",
            settings.logging.level,
            valid_levels.join(", ")
        );
    }

    let valid_formats = ["pretty", "json"];
    if !valid_formats.contains(&settings.logging.format.as_str()) {
        anyhow::bail!(
            "Invalid log format '{}'. Valid formats: {}",
            settings.logging.format,
            valid_formats.join(", ")
        );
    }

    let timeouts = &settings.timeouts;
    let zero: Vec<&str> = [
        ("handshake_secs", timeouts.handshake_secs),
        ("request_secs", timeouts.request_secs),
        ("shutdown_secs", timeouts.shutdown_secs),
    ]
    .into_iter()
    .filter(|(_, secs)| *secs == 0)
    .map(|(key, _)| key)
    .collect();
    if !zero.is_empty() {
        anyhow::bail!("Timeouts must be positive: {}", zero.join(", "));
    }

    Ok(())
}
