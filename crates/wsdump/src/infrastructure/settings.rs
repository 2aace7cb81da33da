//! Optional TOML configuration file.
//!
//! ```toml
//! [server]
//! port = 9980
//! bind_address = "0.0.0.0"
//! max_frame_read = 1024
//!
//! [capture]
//! directory = "output"
//!
//! [logging]
//! directory = "log"
//! file_name = "log.raw"
//! rotate_bytes = 5120
//! level = "info"
//! ```
//!
//! Every key is optional.  Missing keys take the built-in default, and a
//! command-line flag beats whatever the file says (the merge happens in
//! `main.rs`).

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{DEFAULT_CAPTURE_DIR, DEFAULT_PORT};
use crate::domain::frame::DEFAULT_MAX_FRAME_READ;
use crate::domain::ServerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address '{0}'")]
    InvalidBind(String),

    #[error("max_frame_read must be at least 1")]
    ZeroFrameRead,
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileSettings {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// IP address to listen on.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Largest frame payload handed to a session in one piece.
    #[serde(default = "default_max_frame_read")]
    pub max_frame_read: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureSection {
    #[serde(default = "default_capture_dir")]
    pub directory: PathBuf,
}

/// Where and how the log file is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    /// The active log file is archived once it reaches this size.
    #[serde(default = "default_rotate_bytes")]
    pub rotate_bytes: u64,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LoggingSettings {
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

// ── Default value functions (required by serde) ───────────────────────────────

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_max_frame_read() -> usize {
    DEFAULT_MAX_FRAME_READ
}
fn default_capture_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CAPTURE_DIR)
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}
fn default_log_file_name() -> String {
    "log.raw".to_string()
}
fn default_rotate_bytes() -> u64 {
    5 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            max_frame_read: default_max_frame_read(),
        }
    }
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            directory: default_capture_dir(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file_name: default_log_file_name(),
            rotate_bytes: default_rotate_bytes(),
            level: default_log_level(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FileSettings {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Unlike a missing optional file, a path the user named explicitly must
    /// exist: [`SettingsError::Io`] if it cannot be read,
    /// [`SettingsError::Parse`] if the TOML is malformed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Validates the pieces of a [`ServerConfig`] and assembles it.
pub fn server_config(
    bind_address: &str,
    port: u16,
    capture_dir: PathBuf,
    max_frame_read: usize,
) -> Result<ServerConfig, SettingsError> {
    let ip: IpAddr = bind_address
        .parse()
        .map_err(|_| SettingsError::InvalidBind(bind_address.to_string()))?;
    if max_frame_read == 0 {
        return Err(SettingsError::ZeroFrameRead);
    }
    Ok(ServerConfig {
        bind_addr: SocketAddr::new(ip, port),
        capture_dir,
        max_frame_read,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
