//! The command API: builds outbound control messages and writes them to the
//! live connection for a target address.
//!
//! Every operation is fire-and-forget at this layer: look up the handle,
//! encode, write once. If no live connection exists for the address, or the
//! write fails mid-send, the caller gets an error and owns the retry policy —
//! the API never reconnects or retries on its own.

use std::sync::Arc;

use netcafe_core::{encode_message, Message, MessageKind, ProtocolError};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::store::StatusStore;

/// Error type for command delivery.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No live connection exists for the target address.
    #[error("no live connection for {address}")]
    TargetUnreachable { address: String },

    /// The write to the live connection failed (e.g. reset mid-send).
    #[error("write to {address} failed: {source}")]
    Write {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The outbound message could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Builds and delivers control messages to connected clients.
#[derive(Clone)]
pub struct CommandApi {
    store: Arc<StatusStore>,
    identity: String,
}

impl CommandApi {
    pub fn new(store: Arc<StatusStore>, identity: impl Into<String>) -> Self {
        Self {
            store,
            identity: identity.into(),
        }
    }

    /// Asks the client to send a full status report.
    pub async fn request_status(&self, address: &str) -> Result<(), CommandError> {
        self.send_command(address, MessageKind::StatusRequest, Map::new()).await
    }

    /// Tells the client machine to shut down.
    pub async fn shutdown(&self, address: &str) -> Result<(), CommandError> {
        self.send_command(address, MessageKind::Shutdown, Map::new()).await
    }

    /// Tells the client machine to restart.
    pub async fn restart(&self, address: &str) -> Result<(), CommandError> {
        self.send_command(address, MessageKind::Restart, Map::new()).await
    }

    /// Locks the client's screen.
    pub async fn lock_screen(&self, address: &str) -> Result<(), CommandError> {
        self.send_command(address, MessageKind::LockScreen, Map::new()).await
    }

    /// Unlocks the client's screen.
    pub async fn unlock_screen(&self, address: &str) -> Result<(), CommandError> {
        self.send_command(address, MessageKind::UnlockScreen, Map::new()).await
    }

    /// Shows a text message on the client.
    pub async fn send_message(&self, address: &str, text: &str) -> Result<(), CommandError> {
        let mut payload = Map::new();
        payload.insert("message".to_string(), Value::String(text.to_string()));
        self.send_command(address, MessageKind::SendMessage, payload).await
    }

    /// Starts a user session on the client.
    pub async fn start_session(
        &self,
        address: &str,
        user: &str,
        duration_minutes: u64,
    ) -> Result<(), CommandError> {
        let mut payload = Map::new();
        payload.insert("user".to_string(), Value::String(user.to_string()));
        payload.insert("duration_minutes".to_string(), json!(duration_minutes));
        self.send_command(address, MessageKind::StartSession, payload).await
    }

    /// Ends the active session on the client.
    pub async fn end_session(&self, address: &str) -> Result<(), CommandError> {
        self.send_command(address, MessageKind::EndSession, Map::new()).await
    }

    /// Extends the active session on the client.
    pub async fn extend_session(
        &self,
        address: &str,
        additional_minutes: u64,
    ) -> Result<(), CommandError> {
        let mut payload = Map::new();
        payload.insert("additional_minutes".to_string(), json!(additional_minutes));
        self.send_command(address, MessageKind::ExtendSession, payload).await
    }

    async fn send_command(
        &self,
        address: &str,
        kind: MessageKind,
        payload: Map<String, Value>,
    ) -> Result<(), CommandError> {
        let handle =
            self.store
                .get_connection(address)
                .ok_or_else(|| CommandError::TargetUnreachable {
                    address: address.to_string(),
                })?;

        let msg = Message::with_payload(kind, payload, self.identity.clone(), address);
        let bytes = encode_message(&msg)?;

        debug!(address, kind = ?kind, id = %msg.id, "sending command");
        handle
            .send_frame(&bytes)
            .await
            .map_err(|source| CommandError::Write {
                address: address.to_string(),
                source,
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
