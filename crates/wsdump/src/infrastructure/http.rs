//! Minimal HTTP/1.1 plumbing: read one request head, write one response.
//!
//! Only what the dump server needs is here.  Request bodies are never read;
//! the connection either upgrades or is closed after the response.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::RequestHead;

/// Largest request head accepted, in bytes.
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Most headers accepted in one request.
pub const MAX_HEADERS: usize = 64;

const READ_CHUNK: usize = 1024;

/// Errors while reading a request head.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The peer closed the connection before sending anything.
    #[error("connection closed before a request was sent")]
    Closed,

    /// The peer closed the connection in the middle of the head.
    #[error("connection closed after {0} bytes of an incomplete request head")]
    Truncated(usize),

    #[error("request head exceeds {MAX_HEAD_BYTES} bytes")]
    TooLarge,

    #[error("malformed request head: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("I/O error reading request: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads from `reader` until a complete request head has arrived.
///
/// Returns the parsed head plus any bytes that arrived after it (the start of
/// the first WebSocket frame, for an eager client).
pub async fn read_request_head<R>(
    reader: &mut R,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
) -> Result<(RequestHead, Vec<u8>), HttpError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(if buf.is_empty() {
                HttpError::Closed
            } else {
                HttpError::Truncated(buf.len())
            });
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some((head, consumed)) = parse_head(&buf, peer_addr, local_addr)? {
            let leftover = buf.split_off(consumed);
            return Ok((head, leftover));
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(HttpError::TooLarge);
        }
    }
}

fn parse_head(
    buf: &[u8],
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
) -> Result<Option<(RequestHead, usize)>, httparse::Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let consumed = match req.parse(buf)? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let head = RequestHead {
        peer_addr,
        local_addr,
        method: req.method.unwrap_or_default().to_string(),
        target: req.path.unwrap_or_default().to_string(),
        version: format!("HTTP/1.{}", req.version.unwrap_or(1)),
        headers: req
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect(),
    };
    Ok(Some((head, consumed)))
}

/// Writes `101 Switching Protocols` completing a WebSocket handshake.
pub async fn write_switching_protocols<W>(writer: &mut W, accept_key: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n\
         \r\n"
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

/// Writes `400 Bad Request` with an empty body, optionally advertising the
/// WebSocket version the server supports.
pub async fn write_bad_request<W>(writer: &mut W, supported_version: Option<&str>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut response = String::from("HTTP/1.1 400 Bad Request\r\n");
    if let Some(version) = supported_version {
        response.push_str(&format!("Sec-WebSocket-Version: {version}\r\n"));
    }
    response.push_str("Content-Length: 0\r\nConnection: close\r\n\r\n");
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

/// Writes `200 OK` carrying `body` as a single-chunk `text/html` response.
pub async fn write_chunked_html<W>(writer: &mut W, body: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut response = String::with_capacity(body.len() + 128);
    response.push_str(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html\r\n\
         Transfer-Encoding: chunked\r\n\
         Connection: close\r\n\
         \r\n",
    );
    if !body.is_empty() {
        response.push_str(&format!("{:x}\r\n", body.len()));
        response.push_str(body);
        response.push_str("\r\n");
    }
    response.push_str("0\r\n\r\n");
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}
