//! Traits the connection session is written against.
//!
//! Infrastructure implementations wrap tokio-tungstenite and the capture
//! directory; test implementations record calls.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Frame;

/// Failures touching the capture artifact.  Every variant carries the path
/// involved so the log line is enough to find the problem on disk.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to create capture directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open capture file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write capture file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to flush capture file {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Echoing a frame back to the peer failed.
#[derive(Debug, Error)]
#[error("failed to echo frame: {0}")]
pub struct SendError(pub String);

/// Durable record of the frames one session receives.
///
/// Exactly one sink exists per session and it is never shared.
#[async_trait]
pub trait FrameSink: Send {
    /// Where the capture artifact lives.
    fn path(&self) -> &Path;

    /// Appends the frame's payload followed by a line terminator.
    async fn record(&mut self, frame: &Frame) -> Result<(), CaptureError>;

    /// Flushes everything buffered.  Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), CaptureError>;
}

/// Opens a fresh [`FrameSink`] for a session that just completed its
/// handshake.
#[async_trait]
pub trait SinkOpener: Send + Sync {
    type Sink: FrameSink;

    async fn open(
        &self,
        session_id: Uuid,
        opened_at: DateTime<Local>,
    ) -> Result<Self::Sink, CaptureError>;
}

/// The upgraded connection, seen one frame at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameTransport: Send {
    /// Waits for the next frame.
    ///
    /// Returns `None` when the peer went away or the transport failed; the
    /// session treats both as a non-positive read.
    async fn recv(&mut self) -> Option<Frame>;

    /// Sends `frame` back unchanged: same payload, same opcode, same FIN bit.
    async fn send(&mut self, frame: &Frame) -> Result<(), SendError>;

    /// Closes the connection.  Errors are swallowed; the peer may be gone.
    async fn shutdown(&mut self);
}
