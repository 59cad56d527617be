//! The transport listener: accepts client connections and runs one worker
//! per connection.
//!
//! Framing is newline-delimited JSON: one complete message per line. The
//! worker reads a line, decodes it, and hands it to the dispatch registry; a
//! line that fails to decode is logged and skipped without closing the
//! connection. End-of-stream, an I/O error, or the idle read timeout all end
//! the worker the same way: one store critical section that drops the
//! connection handle and marks the client offline.
//!
//! The accept loop binds once at startup (bind failure is fatal and handled
//! by the caller) and then runs until the shutdown signal flips. Accept
//! failures while running are logged and the loop continues; once shutdown
//! has been signalled the loop ends silently. Workers observe the same
//! signal, so shutdown unblocks every in-flight read without needing to rip
//! sockets out from under them.

use std::sync::Arc;
use std::time::Duration;

use netcafe_core::decode_message;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{tcp::OwnedReadHalf, TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::dispatch::DispatchRegistry;
use crate::store::{ConnectionHandle, StatusStore};

/// How long shutdown waits for connection workers to observe the signal.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the accept loop until `shutdown` flips, then drains the workers.
pub async fn accept_loop(
    listener: TcpListener,
    store: Arc<StatusStore>,
    registry: Arc<DispatchRegistry>,
    read_timeout: Duration,
    max_connections: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut workers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let address = peer.ip().to_string();
                    if store.connection_count() >= max_connections {
                        // Advisory cap only: log and keep serving.
                        warn!(%address, max_connections, "connection count exceeds configured maximum");
                    }
                    debug!(%address, "accepted connection");

                    let store = Arc::clone(&store);
                    let registry = Arc::clone(&registry);
                    let shutdown = shutdown.clone();
                    workers.spawn(async move {
                        handle_connection(stream, address, store, registry, read_timeout, shutdown)
                            .await;
                    });
                }
                Err(e) => {
                    if *shutdown.borrow() {
                        break;
                    }
                    error!("accept failed: {e}");
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    drain_workers(&mut workers).await;
    info!("listener stopped");
}

/// Waits for all connection workers to exit, bounded by
/// [`WORKER_DRAIN_TIMEOUT`]; stragglers are aborted.
async fn drain_workers(workers: &mut JoinSet<()>) {
    let drained = timeout(WORKER_DRAIN_TIMEOUT, async {
        while workers.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(remaining = workers.len(), "aborting workers that missed the shutdown deadline");
        workers.abort_all();
    }
}

/// Per-connection worker: register the handle, then read frames until the
/// connection ends.
async fn handle_connection(
    stream: TcpStream,
    address: String,
    store: Arc<StatusStore>,
    registry: Arc<DispatchRegistry>,
    read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let (read_half, write_half) = stream.into_split();

    // A reconnect from the same address supersedes the old handle; the old
    // connection is assumed dead.
    store.register_connection(&address, ConnectionHandle::new(write_half));

    let mut reader = BufReader::new(read_half);
    loop {
        tokio::select! {
            result = read_frame(&mut reader, read_timeout) => match result {
                FrameRead::Frame(frame) => process_frame(&registry, &address, &frame),
                FrameRead::Closed(reason) => {
                    debug!(%address, reason, "connection closed");
                    break;
                }
            },
            _ = shutdown.changed() => {
                debug!(%address, "connection closed by server shutdown");
                break;
            }
        }
    }

    // Drop the handle and flip the record offline in one critical section.
    store.disconnect(&address);
}

enum FrameRead {
    Frame(Vec<u8>),
    Closed(&'static str),
}

/// Reads one newline-delimited frame as raw bytes, converting EOF, I/O
/// errors, and idle timeout into [`FrameRead::Closed`]. Frames are left as
/// bytes so that garbage (including invalid UTF-8) reaches the decoder and
/// is classified there rather than tearing down the connection.
async fn read_frame(reader: &mut BufReader<OwnedReadHalf>, read_timeout: Duration) -> FrameRead {
    let mut buf = Vec::new();
    match timeout(read_timeout, reader.read_until(b'\n', &mut buf)).await {
        Ok(Ok(0)) => FrameRead::Closed("end of stream"),
        Ok(Ok(_)) => FrameRead::Frame(buf),
        Ok(Err(_)) => FrameRead::Closed("read error"),
        Err(_) => FrameRead::Closed("idle timeout"),
    }
}

/// Decodes and dispatches one frame. A frame that fails to decode is logged
/// and discarded; the connection stays open.
fn process_frame(registry: &DispatchRegistry, address: &str, frame: &[u8]) {
    if frame.iter().all(|b| b.is_ascii_whitespace()) {
        return;
    }
    match decode_message(frame) {
        Ok(message) => registry.dispatch(message, address),
        Err(e) => warn!(address, "discarding undecodable frame: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
