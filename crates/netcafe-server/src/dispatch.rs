//! Message dispatch: routes a decoded message to the handler for its kind.
//!
//! One handler per [`MessageKind`], registered at startup; registering a kind
//! twice keeps the last handler. Dispatch is a containment boundary: an
//! unknown kind logs a warning and returns, and a handler error is logged and
//! swallowed, so one bad message can never terminate its connection or the
//! server.
//!
//! Before any handler runs the dispatcher overwrites `message.source` with
//! the transport-observed sender address — the claimed source inside an
//! inbound frame is never trusted.

use std::collections::HashMap;
use std::sync::Arc;

use netcafe_core::{Message, MessageKind, PcStatus};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::store::StatusStore;

/// Error produced inside a message handler.
///
/// Handler errors never propagate past [`DispatchRegistry::dispatch`]; the
/// type exists so handlers can use `?` internally and the dispatcher can log
/// something meaningful.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload did not contain what the handler needed.
    #[error("bad payload: {0}")]
    BadPayload(String),
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::BadPayload(e.to_string())
    }
}

/// Fixed handler signature: the (source-corrected) message and the
/// transport-observed sender address.
pub type HandlerFn = Box<dyn Fn(&Message, &str) -> Result<(), HandlerError> + Send + Sync>;

/// Mapping from message kind to its handler.
#[derive(Default)]
pub struct DispatchRegistry {
    handlers: HashMap<MessageKind, HandlerFn>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in status handlers wired to `store`:
    /// `discover_response`, `status_response`, and `status_update`.
    pub fn with_default_handlers(store: Arc<StatusStore>) -> Self {
        let mut registry = Self::new();

        let discover_store = Arc::clone(&store);
        registry.register(
            MessageKind::DiscoverResponse,
            Box::new(move |msg, sender| handle_discover_response(&discover_store, msg, sender)),
        );

        // status_response and status_update share one implementation: both
        // carry a full report that replaces the stored record wholesale.
        for kind in [MessageKind::StatusResponse, MessageKind::StatusUpdate] {
            let report_store = Arc::clone(&store);
            registry.register(
                kind,
                Box::new(move |msg, sender| handle_status_report(&report_store, msg, sender)),
            );
        }

        registry
    }

    /// Associates `handler` with `kind`. Last registration wins.
    pub fn register(&mut self, kind: MessageKind, handler: HandlerFn) {
        self.handlers.insert(kind, handler);
    }

    /// Routes `message` to the handler registered for its kind.
    ///
    /// Overwrites `message.source` with `sender_address` first. Never fails:
    /// unregistered kinds and handler errors are logged and contained.
    pub fn dispatch(&self, mut message: Message, sender_address: &str) {
        message.source = sender_address.to_string();

        match self.handlers.get(&message.kind) {
            Some(handler) => {
                debug!(kind = ?message.kind, sender = sender_address, id = %message.id, "dispatching message");
                if let Err(e) = handler(&message, sender_address) {
                    error!(kind = ?message.kind, sender = sender_address, "handler failed: {e}");
                }
            }
            None => {
                warn!(kind = ?message.kind, sender = sender_address, "no handler for message kind");
            }
        }
    }
}

// ── Built-in handlers ─────────────────────────────────────────────────────────

/// A client answered the discovery broadcast: record it as idle.
fn handle_discover_response(
    store: &StatusStore,
    msg: &Message,
    sender: &str,
) -> Result<(), HandlerError> {
    let name = msg.payload_str("pc_name").unwrap_or_default();
    let hardware_id = msg.payload_str("mac_address").unwrap_or_default();

    debug!(sender, name, "discovered client");
    store.upsert(sender, PcStatus::discovered(name, sender, hardware_id));
    Ok(())
}

/// A client sent a full status report: replace its record wholesale. The
/// address always comes from the transport, whatever the report claims.
fn handle_status_report(
    store: &StatusStore,
    msg: &Message,
    sender: &str,
) -> Result<(), HandlerError> {
    let mut status = PcStatus::from_payload(&msg.payload)?;
    status.address = sender.to_string();

    debug!(sender, name = %status.name, state = ?status.state, "status report");
    store.upsert(sender, status);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
