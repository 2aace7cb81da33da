//! Application layer for wsdump.
//!
//! The application layer holds the connection-handling logic: it knows *what*
//! to do with a request or a frame, but delegates *how* bytes move to the
//! infrastructure layer through the traits in [`ports`].
//!
//! # Responsibilities
//!
//! - Classifying a request as upgrade or plain page (`dispatcher`)
//! - Validating the opening handshake (`handshake`)
//! - Rendering the bootstrap page (`page`)
//! - Running the receive / record / echo loop (`session`)
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections
//! - Tokio task spawning
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod dispatcher;
pub mod handshake;
#[cfg(test)]
pub(crate) mod log_capture;
pub mod page;
pub mod ports;
pub mod session;

pub use dispatcher::{classify, dispatch};
pub use handshake::{negotiate, HandshakeOutcome};
pub use page::render_bootstrap_page;
pub use ports::{CaptureError, FrameSink, FrameTransport, SendError, SinkOpener};
pub use session::ConnectionSession;
