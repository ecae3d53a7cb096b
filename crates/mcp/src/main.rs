//! Leadbridge MCP server binary.
//!
//! ```bash
//! # Against a live Odoo
//! ODOO_URL=https://crm.example.com ODOO_DB=crm ODOO_USERNAME=bot ODOO_PASSWORD=... \
//!   ANTHROPIC_API_KEY=... leadbridge-mcp
//!
//! # Against the built-in demo records
//! LEADBRIDGE_ODOO_MOCK=true leadbridge-mcp
//! ```
//!
//! Stdout carries the protocol, so logs go to stderr.

use std::sync::Arc;

use anyhow::Result;
use leadbridge_agent::Toolkit;
use leadbridge_core::config::{AppConfig, LoadOptions, LogFormat};
use leadbridge_mcp::LeadbridgeMcpServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    info!(
        event_name = "mcp.bootstrap.start",
        database = %config.odoo.database,
        mock_backend = config.odoo.mock,
        "starting leadbridge MCP server"
    );
    let toolkit = Toolkit::from_config(&config).await?;

    LeadbridgeMcpServer::new(Arc::new(toolkit)).run_stdio().await
}
