//! wsdump library crate.
//!
//! A diagnostic WebSocket endpoint: it accepts upgrades, echoes every frame
//! back to the sender, and records each session's frames to a `.raw` capture
//! file.  Plain HTTP requests get a small page whose script opens a socket to
//! the same host, sends a greeting, and closes again.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser / WebSocket client
//!         ↕
//! [wsdump]
//!   ├── domain/           Pure types: Frame, Opcode, RequestHead, ServerConfig
//!   ├── application/      Dispatch, handshake rules, bootstrap page, session loop
//!   └── infrastructure/
//!         ├── server      Accept loop (tokio)
//!         ├── http        Request-head reader, raw responses (httparse)
//!         ├── transport   Frame port over tokio-tungstenite
//!         ├── capture     Per-session .raw files
//!         ├── settings    TOML config file
//!         └── logging     Console + rotating file subscriber
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and talks to the outside world only
//!   through the traits in `application::ports`.
//! - `infrastructure` depends on all other layers plus tokio and tungstenite.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: request dispatch and the per-connection frame loop.
pub mod application;

/// Infrastructure layer: sockets, files, configuration, logging.
pub mod infrastructure;
