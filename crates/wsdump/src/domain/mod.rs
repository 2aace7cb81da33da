//! Domain layer for wsdump.
//!
//! Pure types with no dependencies on I/O, networking, or the async runtime:
//! the frame model, the dispatch and handshake outcomes, the session state
//! machine and the resolved configuration.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod frame;
pub mod handshake;
pub mod request;
pub mod session;

pub use config::ServerConfig;
pub use frame::{Frame, Opcode};
pub use handshake::{DispatchDecision, HandshakeRejection, SUPPORTED_VERSION};
pub use request::RequestHead;
pub use session::{CloseReason, SessionState, SessionSummary};
