//! Server side of the RFC 6455 opening handshake.
//!
//! [`negotiate`] validates an upgrade request and either produces the
//! `Sec-WebSocket-Accept` value for the `101` response or names the
//! [`HandshakeRejection`] to answer with `400 Bad Request`.
//!
//! Checks run in this order:
//!
//! 1. method is `GET` and `Connection` carries the `upgrade` token
//! 2. `Sec-WebSocket-Version` is present
//! 3. the version is `13`
//! 4. `Sec-WebSocket-Key` is base64 for exactly 16 bytes
//!
//! No subprotocol or extension is ever accepted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tracing::error;

use crate::domain::{HandshakeRejection, RequestHead, SUPPORTED_VERSION};

/// Decoded length of a valid `Sec-WebSocket-Key`.
const KEY_NONCE_LEN: usize = 16;

/// Result of validating an upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The request is acceptable; reply `101` with this accept key and start
    /// a session.
    Upgraded { accept_key: String },
    /// Reply `400` and drop the connection.
    Rejected(HandshakeRejection),
}

/// Validates `req` as a WebSocket upgrade request.
pub fn negotiate(req: &RequestHead) -> HandshakeOutcome {
    match validate(req) {
        Ok(key) => HandshakeOutcome::Upgraded {
            accept_key: derive_accept_key(key.as_bytes()),
        },
        Err(rejection) => HandshakeOutcome::Rejected(rejection),
    }
}

/// Logs a rejected handshake at error level.
pub fn log_rejection(req: &RequestHead, rejection: HandshakeRejection) {
    error!(
        code = rejection.code(),
        peer = %req.peer_addr,
        "WebSocket handshake rejected: {rejection}"
    );
}

fn validate(req: &RequestHead) -> Result<&str, HandshakeRejection> {
    if !req.method.eq_ignore_ascii_case("GET") || !req.has_token("Connection", "upgrade") {
        return Err(HandshakeRejection::NoHandshake);
    }

    let version = req
        .header("Sec-WebSocket-Version")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(HandshakeRejection::NoVersion)?;
    if version != SUPPORTED_VERSION {
        return Err(HandshakeRejection::UnsupportedVersion);
    }

    let key = req
        .header("Sec-WebSocket-Key")
        .map(str::trim)
        .ok_or(HandshakeRejection::NoKey)?;
    match STANDARD.decode(key) {
        Ok(nonce) if nonce.len() == KEY_NONCE_LEN => Ok(key),
        _ => Err(HandshakeRejection::NoKey),
    }
}
