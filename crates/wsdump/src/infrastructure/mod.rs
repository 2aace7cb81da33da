//! Infrastructure layer for wsdump.
//!
//! Everything that touches a socket, a file, or the process environment.
//!
//! # Responsibilities
//!
//! - Binding the listener and spawning one task per connection (`server`)
//! - Reading request heads and writing raw HTTP responses (`http`)
//! - Adapting tokio-tungstenite to the session's frame port (`transport`)
//! - Per-session capture files (`capture`)
//! - Config file loading (`settings`) and subscriber setup (`logging`)
//!
//! # What does NOT belong here?
//!
//! - Handshake rules and the frame loop (application layer)
//! - Frame and session types (domain layer)
//! - Merging CLI flags with the config file (done in `main.rs`)

pub mod capture;
pub mod http;
pub mod logging;
pub mod server;
pub mod settings;
pub mod transport;

pub use server::{run_server, serve};
