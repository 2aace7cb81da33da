//! Session lifecycle types.

use std::path::PathBuf;

use uuid::Uuid;

/// Lifecycle of one upgraded connection.
///
/// ```text
/// Initial ──▶ Receiving ──▶ Closing ──▶ Terminal
///    │                                     ▲
///    └──────────── (sink open failed) ─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake done; the capture artifact is being opened.
    Initial,
    /// Waiting for, or handling, the next frame.
    Receiving,
    /// Loop finished; the capture artifact is being flushed.
    Closing,
    /// No further operations are allowed.
    Terminal,
}

impl SessionState {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Initial, Receiving)
                | (Initial, Closing)
                | (Initial, Terminal)
                | (Receiving, Closing)
                | (Closing, Terminal)
        )
    }
}

/// Why the relay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame.
    CloseFrame,
    /// A zero-length frame arrived.
    EmptyFrame,
    /// The transport reported end-of-stream or a receive error.
    Disconnected,
    /// Echoing a frame back to the peer failed.
    SendFailed,
    /// The capture artifact could not be written.
    CaptureFailed,
    /// The server is shutting down.
    Cancelled,
}

/// What a finished session reports back to the server loop.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    /// Number of frames received and processed.
    pub frames: u64,
    /// Where the capture artifact was written, if it was opened.
    pub capture_path: Option<PathBuf>,
    pub reason: CloseReason,
    pub state: SessionState,
}
