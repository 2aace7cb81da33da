//! Accept loop and per-connection handling.
//!
//! Every accepted connection runs in its own Tokio task:
//!
//! 1. read and log the request head
//! 2. plain request: send the bootstrap page and close
//! 3. upgrade request: validate the handshake, answer `101` or `400`
//! 4. after `101`: run a [`ConnectionSession`] until the peer closes
//!
//! A failure in one connection is logged and the connection abandoned; the
//! accept loop keeps going.  Cancelling the shutdown token stops the accept
//! loop, after which [`serve`] waits for the connection tasks (which watch the
//! same token) to wind down.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::handshake::log_rejection;
use crate::application::{dispatch, negotiate, render_bootstrap_page, ConnectionSession, HandshakeOutcome};
use crate::domain::{DispatchDecision, HandshakeRejection, RequestHead, ServerConfig};
use crate::infrastructure::capture::CaptureDirectory;
use crate::infrastructure::http::{
    read_request_head, write_bad_request, write_chunked_html, write_switching_protocols, HttpError,
};
use crate::infrastructure::transport::WsTransport;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (port in use, missing
/// permission).
pub async fn run_server(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;

    info!("WebSocket dump server listening on {}", config.bind_addr);

    serve(listener, config, shutdown).await
}

/// Runs the accept loop on an already bound listener.
///
/// Split from [`run_server`] so tests can bind port 0 and learn the address
/// before serving.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let opener = Arc::new(CaptureDirectory::new(&config.capture_dir));
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested; stopping accept loop");
                break;
            }
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                log_task_exit(joined);
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    debug!("new connection from {peer_addr}");
                    let config = Arc::clone(&config);
                    let opener = Arc::clone(&opener);
                    let cancel = shutdown.clone();
                    connections.spawn(async move {
                        handle_connection(stream, peer_addr, config, opener, cancel).await;
                    });
                }
                Err(e) => {
                    // Transient (e.g. out of file descriptors); keep accepting.
                    error!("accept error: {e}");
                }
            },
        }
    }

    drop(listener);
    if !connections.is_empty() {
        info!("waiting for {} open connection(s) to finish", connections.len());
    }
    while let Some(joined) = connections.join_next().await {
        log_task_exit(joined);
    }

    info!("WebSocket dump server stopped");
    Ok(())
}

fn log_task_exit(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("connection task panicked: {e}");
        }
    }
}

// ── Per-connection handling ───────────────────────────────────────────────────

/// Entry point of each connection task; logs whatever [`run_connection`]
/// returns.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    opener: Arc<CaptureDirectory>,
    cancel: CancellationToken,
) {
    if let Err(e) = run_connection(stream, peer_addr, &config, &opener, &cancel).await {
        error!("connection {peer_addr} failed: {e:#}");
    }
}

async fn run_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    config: &ServerConfig,
    opener: &CaptureDirectory,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let local_addr = stream
        .local_addr()
        .context("failed to read local address")?;

    let read = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        read = read_request_head(&mut stream, peer_addr, local_addr) => read,
    };

    let (head, leftover) = match read {
        Ok(parsed) => parsed,
        Err(HttpError::Closed) => {
            debug!("{peer_addr} closed without sending a request");
            return Ok(());
        }
        Err(e) => {
            let rejection = HandshakeRejection::NoHandshake;
            error!(
                code = rejection.code(),
                peer = %peer_addr,
                "unreadable request: {e}"
            );
            return write_bad_request(&mut stream, None)
                .await
                .context("failed to send 400 response");
        }
    };

    match dispatch(&head) {
        DispatchDecision::PlainRequest => send_bootstrap_page(stream, &head).await,
        DispatchDecision::UpgradeRequested => {
            upgrade(stream, head, leftover, config, opener, cancel).await
        }
    }
}

async fn send_bootstrap_page(mut stream: TcpStream, head: &RequestHead) -> anyhow::Result<()> {
    let page = render_bootstrap_page(&head.authority());
    write_chunked_html(&mut stream, &page)
        .await
        .context("failed to send bootstrap page")?;
    // The peer may already be gone; the page is out either way.
    let _ = stream.shutdown().await;
    Ok(())
}

async fn upgrade(
    mut stream: TcpStream,
    head: RequestHead,
    leftover: Vec<u8>,
    config: &ServerConfig,
    opener: &CaptureDirectory,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let accept_key = match negotiate(&head) {
        HandshakeOutcome::Upgraded { accept_key } => accept_key,
        HandshakeOutcome::Rejected(rejection) => {
            log_rejection(&head, rejection);
            return write_bad_request(&mut stream, rejection.advertised_version())
                .await
                .context("failed to send 400 response");
        }
    };

    write_switching_protocols(&mut stream, &accept_key)
        .await
        .context("failed to send 101 response")?;

    // Anything the client sent right after its request head is the start of
    // the first frame.
    let ws = WebSocketStream::from_partially_read(stream, leftover, Role::Server, None).await;
    let transport = WsTransport::new(ws, config.max_frame_read);

    let summary = ConnectionSession::new(transport).run(opener, cancel).await;
    info!(
        session_id = %summary.session_id,
        frames = summary.frames,
        reason = ?summary.reason,
        "session with {} finished",
        head.peer_addr
    );
    Ok(())
}
