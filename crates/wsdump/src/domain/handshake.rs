//! Request classification and handshake rejection types.

use std::fmt;

/// The only WebSocket protocol version this server speaks.
pub const SUPPORTED_VERSION: &str = "13";

/// Route chosen for an inbound HTTP request.
///
/// Computed once per request from the `Upgrade` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    /// `Upgrade: websocket` was present; run the handshake and a session.
    UpgradeRequested,
    /// Anything else; serve the bootstrap page.
    PlainRequest,
}

/// Why an upgrade request was refused.
///
/// Every variant is answered with `400 Bad Request` and an empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRejection {
    /// The request is not a well-formed upgrade (bad head, wrong method,
    /// no `Connection: upgrade`).
    NoHandshake,
    /// `Sec-WebSocket-Version` is missing.
    NoVersion,
    /// `Sec-WebSocket-Version` names a version other than [`SUPPORTED_VERSION`].
    UnsupportedVersion,
    /// `Sec-WebSocket-Key` is missing or is not a base64-encoded 16-byte nonce.
    NoKey,
}

impl HandshakeRejection {
    /// Stable numeric code written to the error log.
    pub fn code(self) -> u8 {
        match self {
            HandshakeRejection::NoHandshake => 1,
            HandshakeRejection::NoVersion => 2,
            HandshakeRejection::UnsupportedVersion => 3,
            HandshakeRejection::NoKey => 4,
        }
    }

    /// Value for the `Sec-WebSocket-Version` response header, if this
    /// rejection advertises one.
    pub fn advertised_version(self) -> Option<&'static str> {
        match self {
            HandshakeRejection::UnsupportedVersion => Some(SUPPORTED_VERSION),
            _ => None,
        }
    }
}

impl fmt::Display for HandshakeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HandshakeRejection::NoHandshake => "no WebSocket handshake in request",
            HandshakeRejection::NoVersion => "missing Sec-WebSocket-Version in handshake request",
            HandshakeRejection::UnsupportedVersion => "unsupported WebSocket version requested",
            HandshakeRejection::NoKey => "missing or invalid Sec-WebSocket-Key in handshake request",
        };
        f.write_str(text)
    }
}

impl std::error::Error for HandshakeRejection {}
