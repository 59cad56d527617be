//! The status store: the server's in-memory registry of every known client.
//!
//! Two maps, one lock. The store keys both the last-known [`PcStatus`] and
//! the live [`ConnectionHandle`] by client address, behind a single mutex so
//! that disconnect cleanup (drop the handle, mark the status offline) is one
//! critical section and no reader can observe the half-done state in between.
//!
//! The lock is a plain `std::sync::Mutex`: every critical section is a map
//! operation with no awaits inside, and the fleet is tens of machines, so a
//! global lock is simpler and safe. Socket writes happen *after* the handle
//! has been cloned out of the map, never under the store lock.
//!
//! Status records are never evicted automatically — a disconnected client
//! stays as a stale offline record until [`StatusStore::remove`] is called by
//! an operator-facing layer.
//!
//! State transitions are published as [`StatusEvent`]s on an unbounded
//! channel handed out by [`StatusStore::new`]; persistence and business-logic
//! layers consume them without ever touching the maps directly.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::Arc;

use netcafe_core::{PcState, PcStatus};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

/// A state transition observed for one client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub address: String,
    pub state: PcState,
}

/// Live write half of a client connection.
///
/// The transport listener owns the socket; the store holds one of these
/// clones purely for routing outbound commands. Writes are serialized per
/// connection through the inner async mutex so a command write cannot
/// interleave with another command's bytes.
#[derive(Clone)]
pub struct ConnectionHandle {
    writer: Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl ConnectionHandle {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Arc::new(tokio::sync::Mutex::new(Box::new(writer))),
        }
    }

    /// Writes one frame (the encoded message plus the newline delimiter).
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error; the caller decides whether the
    /// failure means the connection is dead.
    pub async fn send_frame(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Inner {
    status: HashMap<String, PcStatus>,
    connections: HashMap<String, ConnectionHandle>,
}

/// Concurrency-safe registry mapping client address to last-known status and
/// live connection handle.
pub struct StatusStore {
    inner: Mutex<Inner>,
    events: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusStore {
    /// Creates a store together with the receiver for status-change events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            inner: Mutex::new(Inner::default()),
            events: tx,
        };
        (store, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-map-operation; the maps are still
        // structurally valid, so continue with the recovered guard.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, address: &str, state: PcState) {
        // Receiver dropped means nobody is listening; that is fine.
        let _ = self.events.send(StatusEvent {
            address: address.to_string(),
            state,
        });
    }

    /// Replaces the record for `address` wholesale, inserting if absent.
    pub fn upsert(&self, address: &str, status: PcStatus) {
        let prior_state = {
            let mut inner = self.lock();
            let prior = inner.status.get(address).map(|s| s.state);
            inner.status.insert(address.to_string(), status.clone());
            prior
        };
        if prior_state != Some(status.state) {
            self.emit(address, status.state);
        }
    }

    /// Sets `state = offline` on the existing record, if any.
    ///
    /// A no-op for unknown addresses: a connection that never produced a
    /// status report leaves no record behind.
    pub fn mark_offline(&self, address: &str) {
        let changed = {
            let mut inner = self.lock();
            match inner.status.get_mut(address) {
                Some(status) if status.state != PcState::Offline => {
                    status.state = PcState::Offline;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(address, PcState::Offline);
        }
    }

    /// Returns a copy of the record for `address`.
    pub fn get(&self, address: &str) -> Option<PcStatus> {
        self.lock().status.get(address).cloned()
    }

    /// Returns a snapshot of all records, sorted by machine name.
    ///
    /// The snapshot is a copy: callers iterating it are unaffected by
    /// concurrent upserts.
    pub fn list_all(&self) -> Vec<PcStatus> {
        let mut all: Vec<PcStatus> = self.lock().status.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Removes the record and any connection handle for `address`.
    ///
    /// Eviction is always explicit; nothing in the server calls this on its
    /// own.
    pub fn remove(&self, address: &str) {
        let mut inner = self.lock();
        inner.status.remove(address);
        inner.connections.remove(address);
    }

    /// Associates a live connection handle with `address`.
    ///
    /// At most one handle exists per address: a new registration silently
    /// supersedes the previous one, which is assumed dead.
    pub fn register_connection(&self, address: &str, handle: ConnectionHandle) {
        let superseded = self
            .lock()
            .connections
            .insert(address.to_string(), handle)
            .is_some();
        if superseded {
            debug!(address, "superseded existing connection handle");
        }
    }

    /// Drops the connection handle for `address`, keeping the status record.
    pub fn unregister_connection(&self, address: &str) {
        self.lock().connections.remove(address);
    }

    /// Removes the connection handle and marks the record offline in a single
    /// critical section. Called by the transport on connection loss.
    pub fn disconnect(&self, address: &str) {
        let changed = {
            let mut inner = self.lock();
            inner.connections.remove(address);
            match inner.status.get_mut(address) {
                Some(status) if status.state != PcState::Offline => {
                    status.state = PcState::Offline;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(address, PcState::Offline);
        }
    }

    /// Returns the live connection handle for `address`, if one exists.
    pub fn get_connection(&self, address: &str) -> Option<ConnectionHandle> {
        self.lock().connections.get(address).cloned()
    }

    /// Number of live connection handles.
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
