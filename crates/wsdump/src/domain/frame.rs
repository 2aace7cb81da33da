//! WebSocket frame model.
//!
//! A [`Frame`] is one unit of traffic as seen by the relay loop: the payload
//! bytes of a single receive call plus the opcode and FIN bit that travelled
//! with them.  Frames are transient; the session builds one per receive,
//! records it, echoes it and drops it.
//!
//! # Flags word
//!
//! The first byte of an RFC 6455 frame header packs the FIN bit, three RSV
//! bits and the 4-bit opcode:
//!
//! ```text
//!  7   6    5    4    3..0
//! FIN RSV1 RSV2 RSV3 opcode
//! ```
//!
//! [`Frame::raw_flags`] reproduces that byte.  No extensions are negotiated,
//! so the RSV bits are always zero.

use std::fmt;

/// Mask selecting the opcode bits of the flags word.
pub const OPCODE_MASK: u8 = 0x0F;

/// FIN bit of the flags word.
pub const FIN_BIT: u8 = 0x80;

/// Default number of payload bytes delivered per receive call.
pub const DEFAULT_MAX_FRAME_READ: usize = 1024;

/// Maximum number of payload bytes rendered into a single log line.
const LOG_PREVIEW_LIMIT: usize = 256;

/// Frame opcode as defined by RFC 6455 §5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Returns `true` for close, ping and pong.
    pub fn is_control(self) -> bool {
        (self as u8) & 0x08 != 0
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    /// Decodes the low nibble of a flags word; reserved opcodes are returned
    /// as the error value.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & OPCODE_MASK {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(other),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Continuation => "continuation",
            Opcode::Text => "text",
            Opcode::Binary => "binary",
            Opcode::Close => "close",
            Opcode::Ping => "ping",
            Opcode::Pong => "pong",
        };
        f.write_str(name)
    }
}

/// One received (or echoed) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Vec<u8>,
    opcode: Opcode,
    is_final: bool,
}

impl Frame {
    pub fn new(payload: Vec<u8>, opcode: Opcode, is_final: bool) -> Self {
        Self {
            payload,
            opcode,
            is_final,
        }
    }

    /// Builds a frame from a flags word as it appears on the wire.
    ///
    /// Returns `None` when the opcode nibble is reserved.
    pub fn from_raw_flags(payload: Vec<u8>, flags: u8) -> Option<Self> {
        let opcode = Opcode::try_from(flags).ok()?;
        Some(Self::new(payload, opcode, flags & FIN_BIT != 0))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_close(&self) -> bool {
        self.opcode == Opcode::Close
    }

    /// The first header byte: FIN bit, zero RSV bits and the opcode.
    pub fn raw_flags(&self) -> u8 {
        let fin = if self.is_final { FIN_BIT } else { 0 };
        fin | self.opcode as u8
    }

    /// Whether the relay loop must stop after handling this frame.
    ///
    /// A zero-length frame ends the session whatever its opcode; a close frame
    /// ends it whatever its length.
    pub fn ends_session(&self) -> bool {
        self.is_empty() || self.is_close()
    }

    /// Splits `payload` into frames of at most `max_read` bytes.
    ///
    /// The first piece keeps `opcode`, later pieces are continuations, and only
    /// the last piece carries `is_final`.  Control frames and payloads that
    /// already fit are returned as a single frame.  An empty payload yields one
    /// empty frame.
    pub fn split(payload: Vec<u8>, opcode: Opcode, is_final: bool, max_read: usize) -> Vec<Frame> {
        let max_read = max_read.max(1);
        if opcode.is_control() || payload.len() <= max_read {
            return vec![Frame::new(payload, opcode, is_final)];
        }

        let count = payload.len().div_ceil(max_read);
        payload
            .chunks(max_read)
            .enumerate()
            .map(|(i, chunk)| {
                let op = if i == 0 { opcode } else { Opcode::Continuation };
                let fin = i + 1 == count && is_final;
                Frame::new(chunk.to_vec(), op, fin)
            })
            .collect()
    }

    /// Renders the payload for a text log line.
    ///
    /// Printable ASCII passes through; everything else is escaped.  Output is
    /// capped at 256 payload bytes.
    pub fn log_preview(&self) -> String {
        let shown = &self.payload[..self.payload.len().min(LOG_PREVIEW_LIMIT)];
        let mut out = String::with_capacity(shown.len());
        for &b in shown {
            match b {
                b'\n' => out.push_str("\\n"),
                b'\r' => out.push_str("\\r"),
                b'\t' => out.push_str("\\t"),
                b'\\' => out.push_str("\\\\"),
                0x20..=0x7E => out.push(b as char),
                _ => out.push_str(&format!("\\x{b:02x}")),
            }
        }
        if self.payload.len() > LOG_PREVIEW_LIMIT {
            out.push_str("...");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_flags_final_text_is_0x81() {
        let frame = Frame::new(b"hi".to_vec(), Opcode::Text, true);
        assert_eq!(frame.raw_flags(), 0x81);
    }

    #[test]
    fn test_raw_flags_non_final_binary_is_0x02() {
        let frame = Frame::new(vec![1, 2, 3], Opcode::Binary, false);
        assert_eq!(frame.raw_flags(), 0x02);
    }

    #[test]
    fn test_raw_flags_close_is_0x88() {
        let frame = Frame::new(vec![0x03, 0xE8], Opcode::Close, true);
        assert_eq!(frame.raw_flags(), 0x88);
    }

    #[test]
    fn test_from_raw_flags_recovers_opcode_and_fin() {
        let frame = Frame::from_raw_flags(b"x".to_vec(), 0x89).unwrap();
        assert_eq!(frame.opcode(), Opcode::Ping);
        assert!(frame.is_final());
    }

    #[test]
    fn test_from_raw_flags_rejects_reserved_opcode() {
        assert!(Frame::from_raw_flags(Vec::new(), 0x83).is_none());
        assert!(Frame::from_raw_flags(Vec::new(), 0x8B).is_none());
    }

    #[test]
    fn test_control_opcodes() {
        assert!(Opcode::Close.is_control());
        assert!(Opcode::Ping.is_control());
        assert!(Opcode::Pong.is_control());
        assert!(!Opcode::Text.is_control());
        assert!(!Opcode::Binary.is_control());
        assert!(!Opcode::Continuation.is_control());
    }

    #[test]
    fn test_ends_session_on_empty_non_close_frame() {
        // Length is the primary closing signal.
        let frame = Frame::new(Vec::new(), Opcode::Text, true);
        assert!(frame.ends_session());
    }

    #[test]
    fn test_ends_session_on_close_with_payload() {
        let frame = Frame::new(vec![0x03, 0xE8], Opcode::Close, true);
        assert!(frame.ends_session());
    }

    #[test]
    fn test_data_frame_does_not_end_session() {
        let frame = Frame::new(b"Hello, world!".to_vec(), Opcode::Text, true);
        assert!(!frame.ends_session());
    }

    #[test]
    fn test_split_small_payload_is_single_frame() {
        let frames = Frame::split(b"abc".to_vec(), Opcode::Text, true, 1024);
        assert_eq!(frames, vec![Frame::new(b"abc".to_vec(), Opcode::Text, true)]);
    }

    #[test]
    fn test_split_large_payload_uses_continuations() {
        // Arrange: 2500 bytes with a 1024-byte cap → 1024 + 1024 + 452
        let payload: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();

        // Act
        let frames = Frame::split(payload.clone(), Opcode::Binary, true, 1024);

        // Assert
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].opcode(), Opcode::Binary);
        assert!(!frames[0].is_final());
        assert_eq!(frames[1].opcode(), Opcode::Continuation);
        assert!(!frames[1].is_final());
        assert_eq!(frames[2].opcode(), Opcode::Continuation);
        assert!(frames[2].is_final());
        assert_eq!(frames[2].len(), 452);
        let joined: Vec<u8> = frames.iter().flat_map(|f| f.payload().to_vec()).collect();
        assert_eq!(joined, payload);
    }

    #[test]
    fn test_split_exact_multiple_has_no_empty_tail() {
        let frames = Frame::split(vec![7u8; 2048], Opcode::Text, true, 1024);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == 1024));
    }

    #[test]
    fn test_split_never_splits_control_frames() {
        let frames = Frame::split(vec![0u8; 125], Opcode::Ping, true, 16);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_split_empty_payload_yields_one_empty_frame() {
        let frames = Frame::split(Vec::new(), Opcode::Text, true, 1024);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_log_preview_escapes_non_printable() {
        let frame = Frame::new(vec![b'a', 0x00, b'\n', 0xFF], Opcode::Binary, true);
        assert_eq!(frame.log_preview(), "a\\x00\\n\\xff");
    }

    #[test]
    fn test_log_preview_truncates_long_payloads() {
        let frame = Frame::new(vec![b'z'; 300], Opcode::Text, true);
        let preview = frame.log_preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), 256 + 3);
    }

    #[test]
    fn test_opcode_display_names() {
        assert_eq!(Opcode::Text.to_string(), "text");
        assert_eq!(Opcode::Close.to_string(), "close");
    }
}
