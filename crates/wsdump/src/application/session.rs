//! The receive / record / echo loop for one upgraded connection.
//!
//! # Lifecycle
//!
//! ```text
//! Initial     log open timestamp, open capture file, log its path, banner
//!    │
//! Receiving   recv ─▶ record to capture ─▶ log length+flags ─▶ echo
//!    │        (repeat until a zero-length frame, a close frame,
//!    │         a transport failure, or cancellation)
//! Closing     banner, flush + close capture file, close transport
//!    │
//! Terminal
//! ```
//!
//! The capture file is owned by the session and closed on every exit path.
//! If it cannot be opened the session goes straight to `Terminal` without
//! touching a single frame.

use chrono::{DateTime, Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::ports::{FrameSink, FrameTransport, SinkOpener};
use crate::domain::{CloseReason, Frame, SessionState, SessionSummary};

const BANNER: &str = "================================================";

/// One upgraded connection from handshake completion to teardown.
pub struct ConnectionSession<T> {
    id: Uuid,
    opened_at: DateTime<Local>,
    transport: T,
    frames: u64,
    state: SessionState,
}

impl<T: FrameTransport> ConnectionSession<T> {
    /// Creates a session in the `Initial` state, stamped with the current
    /// local time.
    pub fn new(transport: T) -> Self {
        Self::with_clock(transport, Local::now())
    }

    fn with_clock(transport: T, opened_at: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at,
            transport,
            frames: 0,
            state: SessionState::Initial,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to completion.
    ///
    /// `cancel` is checked between frames and raced against every receive;
    /// once it fires the session moves to `Closing`.
    pub async fn run<O: SinkOpener>(mut self, opener: &O, cancel: &CancellationToken) -> SessionSummary {
        let session_id = self.id;
        info!(%session_id, "{}", open_stamp(&self.opened_at));

        let mut sink = match opener.open(session_id, self.opened_at).await {
            Ok(sink) => sink,
            Err(e) => {
                error!(%session_id, "capture file unavailable, aborting session: {e}");
                self.transport.shutdown().await;
                self.transition(SessionState::Terminal);
                return self.summary(None, CloseReason::CaptureFailed);
            }
        };

        info!(%session_id, "Output file stored at: {}", sink.path().display());
        info!(%session_id, "WebSocket connection established.");
        info!(%session_id, "{BANNER}");

        self.transition(SessionState::Receiving);
        let reason = self.relay(&mut sink, cancel).await;

        self.transition(SessionState::Closing);
        info!(%session_id, ?reason, frames = self.frames, "WebSocket connection closed.");
        info!(%session_id, "{BANNER}\n\n");
        if let Err(e) = sink.close().await {
            error!(%session_id, "{e}");
        }
        self.transport.shutdown().await;
        self.transition(SessionState::Terminal);

        let path = sink.path().to_path_buf();
        self.summary(Some(path), reason)
    }

    async fn relay<S: FrameSink>(&mut self, sink: &mut S, cancel: &CancellationToken) -> CloseReason {
        let session_id = self.id;
        loop {
            if cancel.is_cancelled() {
                return CloseReason::Cancelled;
            }
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => return CloseReason::Cancelled,
                frame = self.transport.recv() => frame,
            };

            let Some(frame) = received else {
                debug!(%session_id, "transport ended");
                return CloseReason::Disconnected;
            };
            self.frames += 1;

            if let Err(reason) = self.handle(sink, &frame).await {
                return reason;
            }

            if frame.ends_session() {
                return if frame.is_close() {
                    CloseReason::CloseFrame
                } else {
                    CloseReason::EmptyFrame
                };
            }
        }
    }

    /// Records, logs and echoes one frame.
    async fn handle<S: FrameSink>(&mut self, sink: &mut S, frame: &Frame) -> Result<(), CloseReason> {
        let session_id = self.id;

        // The capture file holds data-bearing frames only.
        if !frame.is_close() {
            if let Err(e) = sink.record(frame).await {
                error!(%session_id, "{e}");
                return Err(CloseReason::CaptureFailed);
            }
        }

        info!(
            %session_id,
            length = frame.len(),
            flags = %format!("{:#04x}", frame.raw_flags()),
            opcode = %frame.opcode(),
            "Frame received (buffer={})",
            frame.log_preview()
        );

        match self.transport.send(frame).await {
            Ok(()) => Ok(()),
            // The peer may drop the socket right after its close frame.
            Err(e) if frame.is_close() => {
                debug!(%session_id, "close echo not delivered: {e}");
                Ok(())
            }
            Err(e) => {
                warn!(%session_id, "{e}");
                Err(CloseReason::SendFailed)
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    fn summary(&self, capture_path: Option<std::path::PathBuf>, reason: CloseReason) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            frames: self.frames,
            capture_path,
            reason,
            state: self.state,
        }
    }
}

/// HTTP-date (RFC 1123) form of the session open time, always in GMT.
fn open_stamp(at: &DateTime<Local>) -> String {
    at.with_timezone(&Utc)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
