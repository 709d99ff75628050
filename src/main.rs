use anyhow::{Context, Result};
use clap::Parser;
use mcp_hub::config::{self, HubSettings, ToolFilter, TransportKind};
use mcp_hub::endpoint::{HubManager, HubTimeouts, LoadReport, StdioConnector};
use mcp_hub::api;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mcp-hub")]
#[command(about = "Aggregates several MCP servers behind one MCP endpoint", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON server document (`mcpServers`, `globalFilters`)
    #[arg(short, long, env = "MCP_HUB_CONFIG")]
    config: PathBuf,

    /// Optional TOML file with hub settings
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Global include patterns, comma separated
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,

    /// Global exclude patterns, comma separated
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Override transport
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    /// Override HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// Override log format (pretty, json)
    #[arg(long, value_parser = ["pretty", "json"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.settings.as_deref())?;

    if let Some(log_level) = cli.log_level {
        settings.logging.level = log_level;
    }
    if let Some(log_format) = cli.log_format {
        settings.logging.format = log_format;
    }
    if let Some(transport) = cli.transport {
        settings.transport.kind = transport;
    }
    if let Some(port) = cli.port {
        settings.transport.port = port;
    }

    init_logging(&settings.logging)?;
    print_banner(&settings, &cli.config);

    let connector = StdioConnector::new(Duration::from_secs(settings.timeouts.handshake_secs));
    let manager = HubManager::with_timeouts(
        Arc::new(connector),
        ToolFilter::from_patterns(cli.include, cli.exclude),
        HubTimeouts::from(&settings.timeouts),
    );

    // A signal during startup still closes whatever already connected
    let report = tokio::select! {
        report = manager.load_from_configuration(&cli.config) => report
            .with_context(|| format!("Failed to load servers from: {}", cli.config.display()))?,
        _ = api::shutdown_signal() => {
            api::drain(&manager).await;
            return Ok(());
        }
    };
    log_report(&report);

    match settings.transport.kind {
        TransportKind::Stdio => api::serve_stdio(manager).await?,
        TransportKind::Http => api::serve_http(manager, &settings.transport).await?,
    }

    Ok(())
}

/// stdout may carry the MCP stream, so logs always go to stderr
fn init_logging(config: &config::LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

fn log_report(report: &LoadReport) {
    info!("Connected servers: {}", report.connected.len());
    for name in &report.connected {
        info!("  → {}", name);
    }
    for name in &report.skipped {
        info!("  → {} (already connected, skipped)", name);
    }
    for (name, e) in &report.failed {
        warn!("  ✗ {}: {}", name, e);
    }
}

fn print_banner(settings: &HubSettings, config_path: &std::path::Path) {
    let version = env!("CARGO_PKG_VERSION");
    let width = 59usize;
    let border = "═".repeat(width + 2);
    let line = |content: &str| {
        info!("║ {:width$} ║", content, width = width);
    };

    info!("╔{}╗", border);
    line("MCP-HUB");
    line(&format!("MCP Aggregation Hub v{}", version));
    info!("╚{}╝", border);
    info!("Server document: {}", config_path.display());
    match settings.transport.kind {
        TransportKind::Stdio => info!("  → Transport: stdio"),
        TransportKind::Http => info!(
            "  → Transport: http ({}:{})",
            settings.transport.host, settings.transport.port
        ),
    }
    info!("  → Log Level: {}", settings.logging.level);
    info!("  → Log Format: {}", settings.logging.format);
    info!(
        "  → Timeouts: handshake {}s, request {}s, shutdown {}s",
        settings.timeouts.handshake_secs,
        settings.timeouts.request_secs,
        settings.timeouts.shutdown_secs
    );
}
