//! [`FrameTransport`] over a tokio-tungstenite `WebSocketStream`.
//!
//! tungstenite reassembles fragmented messages and answers pings and closes
//! on its own.  This adapter turns each inbound message back into frames of at
//! most `max_frame_read` bytes and echoes every frame as a raw frame, so the
//! opcode and FIN bit the session sees are exactly what goes back out.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::OpCode;
use tokio_tungstenite::tungstenite::protocol::frame::Frame as WsFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::application::ports::{FrameTransport, SendError};
use crate::domain::frame::FIN_BIT;
use crate::domain::{Frame, Opcode};

/// An upgraded connection as a stream of [`Frame`]s.
pub struct WsTransport<S> {
    inner: WebSocketStream<S>,
    pending: VecDeque<Frame>,
    max_frame_read: usize,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(inner: WebSocketStream<S>, max_frame_read: usize) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            max_frame_read,
        }
    }
}

#[async_trait]
impl<S> FrameTransport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Option<Frame> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(frame);
        }

        loop {
            let msg = match self.inner.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return None;
                }
                Some(Err(e)) => {
                    debug!("WebSocket receive failed: {e}");
                    return None;
                }
            };

            let Some((payload, opcode, is_final)) = decompose(msg) else {
                continue;
            };
            self.pending = Frame::split(payload, opcode, is_final, self.max_frame_read).into();
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
        }
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), SendError> {
        if frame.is_close() {
            // tungstenite queued a reply carrying the peer's close code when
            // the close frame arrived; flushing puts it on the wire.  A server
            // reports ConnectionClosed once that reply is written.
            return match self.inner.flush().await {
                Ok(()) | Err(WsError::ConnectionClosed) => Ok(()),
                Err(e) => Err(SendError(e.to_string())),
            };
        }

        let raw = WsFrame::message(
            frame.payload().to_vec(),
            to_ws_opcode(frame.opcode()),
            frame.is_final(),
        );
        self.inner
            .send(WsMessage::Frame(raw))
            .await
            .map_err(|e| SendError(e.to_string()))
    }

    async fn shutdown(&mut self) {
        match self.inner.close(None).await {
            Ok(())
            | Err(WsError::ConnectionClosed | WsError::AlreadyClosed)
            | Err(WsError::Protocol(_)) => {}
            Err(e) => warn!("WebSocket close failed: {e}"),
        }
    }
}

/// Splits a tungstenite message into payload, opcode and FIN bit.
///
/// Returns `None` for frames carrying a reserved opcode.
fn decompose(msg: WsMessage) -> Option<(Vec<u8>, Opcode, bool)> {
    let parts = match msg {
        WsMessage::Text(text) => (text.into_bytes(), Opcode::Text, true),
        WsMessage::Binary(data) => (data, Opcode::Binary, true),
        WsMessage::Ping(data) => (data, Opcode::Ping, true),
        WsMessage::Pong(data) => (data, Opcode::Pong, true),
        WsMessage::Close(close) => {
            let payload = close
                .map(|cf| {
                    let mut bytes = u16::from(cf.code).to_be_bytes().to_vec();
                    bytes.extend_from_slice(cf.reason.as_bytes());
                    bytes
                })
                .unwrap_or_default();
            (payload, Opcode::Close, true)
        }
        WsMessage::Frame(raw) => {
            let fin = if raw.header().is_final { FIN_BIT } else { 0 };
            let flags = fin | u8::from(raw.header().opcode);
            let frame = Frame::from_raw_flags(raw.into_data(), flags)?;
            let (opcode, is_final) = (frame.opcode(), frame.is_final());
            (frame.into_payload(), opcode, is_final)
        }
    };
    Some(parts)
}

fn to_ws_opcode(opcode: Opcode) -> OpCode {
    OpCode::from(opcode as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};

    type Duplex = tokio::io::DuplexStream;

    async fn pair(max_frame_read: usize) -> (WsTransport<Duplex>, WebSocketStream<Duplex>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (WsTransport::new(server, max_frame_read), client)
    }

    #[test]
    fn test_decompose_close_with_code_and_reason() {
        let msg = WsMessage::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }));

        let (payload, opcode, fin) = decompose(msg).unwrap();

        assert_eq!(payload, vec![0x03, 0xE8, b'b', b'y', b'e']);
        assert_eq!(opcode, Opcode::Close);
        assert!(fin);
    }

    #[test]
    fn test_decompose_bare_close_is_empty() {
        let (payload, opcode, _) = decompose(WsMessage::Close(None)).unwrap();
        assert!(payload.is_empty());
        assert_eq!(opcode, Opcode::Close);
    }

    #[test]
    fn test_opcode_mapping_matches_wire_values() {
        for op in [
            Opcode::Continuation,
            Opcode::Text,
            Opcode::Binary,
            Opcode::Close,
            Opcode::Ping,
            Opcode::Pong,
        ] {
            assert_eq!(u8::from(to_ws_opcode(op)), op as u8);
        }
    }

    #[tokio::test]
    async fn test_text_message_round_trips_through_echo() {
        // Arrange
        let (mut transport, mut client) = pair(1024).await;
        client.send(WsMessage::Text("Hello, world!".into())).await.unwrap();

        // Act
        let frame = transport.recv().await.unwrap();
        transport.send(&frame).await.unwrap();

        // Assert
        assert_eq!(frame.payload(), b"Hello, world!");
        assert_eq!(frame.raw_flags(), 0x81);
        let echoed = client.next().await.unwrap().unwrap();
        assert_eq!(echoed, WsMessage::Text("Hello, world!".into()));
    }

    #[tokio::test]
    async fn test_large_binary_message_arrives_as_capped_frames() {
        let (mut transport, mut client) = pair(1024).await;
        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
        client.send(WsMessage::Binary(payload.clone())).await.unwrap();

        let mut frames = Vec::new();
        for _ in 0..3 {
            let frame = transport.recv().await.unwrap();
            transport.send(&frame).await.unwrap();
            frames.push(frame);
        }

        let lengths: Vec<usize> = frames.iter().map(Frame::len).collect();
        assert_eq!(lengths, vec![1024, 1024, 952]);
        assert_eq!(frames[0].raw_flags(), 0x02);
        assert_eq!(frames[1].raw_flags(), 0x00);
        assert_eq!(frames[2].raw_flags(), 0x80);
        // The peer reassembles the echoed fragments into the original message.
        let echoed = client.next().await.unwrap().unwrap();
        assert_eq!(echoed, WsMessage::Binary(payload));
    }

    #[tokio::test]
    async fn test_close_is_received_and_echoed() {
        let (mut transport, mut client) = pair(1024).await;
        client.close(None).await.unwrap();

        let frame = transport.recv().await.unwrap();
        transport.send(&frame).await.unwrap();

        assert!(frame.is_close());
        let echoed = client.next().await.unwrap().unwrap();
        assert!(echoed.is_close());
    }

    #[tokio::test]
    async fn test_peer_drop_ends_stream() {
        let (mut transport, client) = pair(1024).await;
        drop(client);

        assert!(transport.recv().await.is_none());
    }
}
