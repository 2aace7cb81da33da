//! Server configuration types.
//!
//! [`ServerConfig`] is the resolved set of runtime settings the core needs.
//! The binary builds it from CLI flags and an optional TOML file; tests build
//! it directly.
//!
//! # Design rationale
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) makes the server easy to embed in tests.
//! The infrastructure layer is responsible for populating it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::domain::frame::DEFAULT_MAX_FRAME_READ;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9980;

/// Default directory for per-session capture files.
pub const DEFAULT_CAPTURE_DIR: &str = "output";

/// All runtime configuration for the dump server.
///
/// Build this struct once at startup and then wrap it in an `Arc` so it can
/// be shared cheaply across all session tasks.
///
/// # Example
///
/// ```rust
/// use wsdump::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 9980);
/// assert_eq!(cfg.max_frame_read, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The address and port the HTTP listener binds to.
    pub bind_addr: SocketAddr,

    /// Directory that receives one `.raw` capture file per session.
    /// Created on demand.
    pub capture_dir: PathBuf,

    /// Maximum number of payload bytes handed to the session per receive.
    /// Longer payloads arrive as several frames.
    pub max_frame_read: usize,
}

impl Default for ServerConfig {
    /// | Field          | Default        |
    /// |----------------|----------------|
    /// | bind_addr      | `0.0.0.0:9980` |
    /// | capture_dir    | `output`       |
    /// | max_frame_read | 1024           |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            max_frame_read: DEFAULT_MAX_FRAME_READ,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
