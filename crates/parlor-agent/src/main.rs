//! # parlor-agent
//!
//! Parlor server binary: loads settings, installs logging and serves the
//! HTTP/SSE API until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parlor_core::logging;
use parlor_server::{ParlorServer, ServerConfig};
use parlor_settings::ParlorSettings;

/// How long open streams get to finish after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Parlor live conversation server.
#[derive(Parser, Debug)]
#[command(name = "parlor-agent", about = "Parlor live conversation server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.parlor/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Settings from file and environment with command-line overrides on top.
    fn resolve_settings(&self) -> Result<ParlorSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(parlor_settings::settings_path);
        let mut settings = parlor_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.resolve_settings()?;

    if settings.logging.json {
        logging::init_json_subscriber(&settings.logging.level);
    } else {
        logging::init_subscriber(&settings.logging.level);
    }
    if parlor_settings::init_settings(settings.clone()).is_err() {
        tracing::warn!("settings were already initialized");
    }

    let server = ParlorServer::new(ServerConfig::from(&settings));
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;
    tracing::info!("Parlor listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(SHUTDOWN_TIMEOUT))
        .await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":9100},"logging":{"level":"debug"}}"#).unwrap();

        let cli = Cli::parse_from([
            "parlor-agent",
            "--settings",
            path.to_str().unwrap(),
            "--host",
            "0.0.0.0",
            "--json-logs",
        ]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn missing_settings_file_uses_defaults() {
        let cli = Cli::parse_from([
            "parlor-agent",
            "--settings",
            "/nonexistent/parlor/settings.json",
            "--port",
            "0",
        ]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.server.host, "127.0.0.1");
    }
}
