//! wsdump: WebSocket dump server, entry point.
//!
//! Accepts WebSocket connections, echoes every frame back to the sender and
//! writes each session's payloads to `output/output<timestamp>.raw`.  A plain
//! HTTP request to the same port returns a page that exercises the endpoint
//! from a browser.
//!
//! # Usage
//!
//! ```text
//! wsdump [OPTIONS]
//!
//! Options:
//!   --port           <PORT>  Listening port [default: 9980]
//!   --bind           <ADDR>  Listening address [default: 0.0.0.0]
//!   --config         <FILE>  TOML configuration file
//!   --capture-dir    <DIR>   Capture file directory [default: output]
//!   --log-dir        <DIR>   Log file directory [default: log]
//!   --max-frame-read <N>     Largest payload piece per frame [default: 1024]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Flag            |
//! |----------------------|-----------------|
//! | `WSDUMP_PORT`        | `--port`        |
//! | `WSDUMP_BIND`        | `--bind`        |
//! | `WSDUMP_CONFIG`      | `--config`      |
//! | `WSDUMP_CAPTURE_DIR` | `--capture-dir` |
//! | `WSDUMP_LOG_DIR`     | `--log-dir`     |
//!
//! A flag (or its variable) beats the config file, which beats the built-in
//! default.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use wsdump::domain::ServerConfig;
use wsdump::infrastructure::logging;
use wsdump::infrastructure::run_server;
use wsdump::infrastructure::settings::{self, FileSettings, LoggingSettings};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Diagnostic WebSocket endpoint.
///
/// Every option is optional so that an unset flag can fall through to the
/// config file.
#[derive(Debug, Parser)]
#[command(
    name = "wsdump",
    about = "WebSocket endpoint that echoes and records every frame it receives",
    version
)]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, env = "WSDUMP_PORT")]
    port: Option<u16>,

    /// IP address to bind to.
    ///
    /// `0.0.0.0` accepts connections on every interface, `127.0.0.1` only
    /// local ones.
    #[arg(long, env = "WSDUMP_BIND")]
    bind: Option<String>,

    /// TOML configuration file.
    #[arg(long, env = "WSDUMP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for per-session capture files.
    #[arg(long, env = "WSDUMP_CAPTURE_DIR")]
    capture_dir: Option<PathBuf>,

    /// Directory for the rotating log file.
    #[arg(long, env = "WSDUMP_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Payloads longer than this reach the session as several frames.
    #[arg(long)]
    max_frame_read: Option<usize>,
}

impl Cli {
    /// Merges flags, the optional config file, and built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the named config file cannot be read or parsed,
    /// or if the resulting bind address or frame size is invalid.
    fn resolve(self) -> anyhow::Result<(ServerConfig, LoggingSettings)> {
        let mut file = match &self.config {
            Some(path) => FileSettings::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileSettings::default(),
        };

        if let Some(dir) = self.log_dir {
            file.logging.directory = dir;
        }

        let config = settings::server_config(
            self.bind.as_deref().unwrap_or(&file.server.bind_address),
            self.port.unwrap_or(file.server.port),
            self.capture_dir.unwrap_or(file.capture.directory),
            self.max_frame_read.unwrap_or(file.server.max_frame_read),
        )?;

        Ok((config, file.logging))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, logging_settings) = Cli::parse().resolve()?;

    let log_guard = logging::init(&logging_settings)?;
    info!("Log file: {}", log_guard.path().display());
    info!(
        "wsdump starting: listen={}, captures={}",
        config.bind_addr,
        config.capture_dir.display()
    );

    // ── Graceful shutdown ─────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                on_ctrl_c.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(config, shutdown).await?;

    drop(log_guard);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
