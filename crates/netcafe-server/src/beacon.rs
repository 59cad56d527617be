//! The discovery beacon: periodic UDP broadcast announcing server presence.
//!
//! Clients on the LAN have no configured server address; they learn it from
//! the beacon. Every interval the beacon builds a `discover` message with the
//! server identity as its source and [`netcafe_core::BROADCAST_TARGET`] as
//! its target, encodes it, and sends the datagram to the configured broadcast
//! address and port.
//!
//! The channel is connectionless and unreliable on purpose: a lost datagram
//! just means the client waits one more interval. Send failures — for
//! example no broadcast-capable interface being up — are logged and the loop
//! carries on at the next tick; the beacon never stops the server.

use std::net::SocketAddr;
use std::time::Duration;

use netcafe_core::{encode_message, Message};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Broadcasts `discover` datagrams to `dest` every `interval` until
/// `shutdown` flips.
///
/// The first broadcast goes out immediately so freshly started servers are
/// discoverable without waiting a full interval.
pub async fn beacon_loop(
    socket: UdpSocket,
    identity: String,
    dest: SocketAddr,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => broadcast_discover(&socket, &identity, dest).await,
            _ = shutdown.changed() => break,
        }
    }

    info!("discovery beacon stopped");
}

/// Sends one `discover` datagram. Failures are logged, never propagated.
async fn broadcast_discover(socket: &UdpSocket, identity: &str, dest: SocketAddr) {
    let msg = Message::discover(identity);
    let bytes = match encode_message(&msg) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to encode discover broadcast: {e}");
            return;
        }
    };
    match socket.send_to(&bytes, dest).await {
        Ok(_) => debug!(%dest, id = %msg.id, "sent discover broadcast"),
        Err(e) => warn!(%dest, "discover broadcast failed: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
