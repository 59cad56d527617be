//! The netcafe message envelope and its fixed set of message kinds.
//!
//! Every logical message on the wire is one JSON object:
//!
//! ```text
//! {"kind": ..., "payload": {...}, "source": ..., "target": ..., "timestamp": ..., "id": ...}
//! ```
//!
//! Field names are part of the protocol and stable across versions.
//! A [`Message`] is never mutated after construction; responses are new
//! messages created with [`Message::response`], carrying a fresh id and a
//! reference to the original id in their payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::ident::new_message_id;

/// Reserved `target` value for discovery broadcasts.
pub const BROADCAST_TARGET: &str = "broadcast";

/// Payload key carrying the id of the message a response refers to.
pub const ORIGINAL_MESSAGE_ID_KEY: &str = "original_message_id";

// ── Message kinds ─────────────────────────────────────────────────────────────

/// The closed enumeration of message purposes.
///
/// The serialized form is the snake_case variant name (`"discover_response"`,
/// `"lock_screen"`, ...). Decoding a `kind` string outside this set fails at
/// the codec with [`crate::ProtocolError::MalformedMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    // Discovery
    Discover,
    DiscoverResponse,
    // Status
    StatusRequest,
    StatusResponse,
    StatusUpdate,
    // Control
    Shutdown,
    Restart,
    LockScreen,
    UnlockScreen,
    SendMessage,
    // Session
    StartSession,
    EndSession,
    ExtendSession,
    // Responses
    Ack,
    Error,
}

// ── Message envelope ──────────────────────────────────────────────────────────

/// A single protocol message.
///
/// `timestamp` is epoch milliseconds assigned at construction and `id` is a
/// freshly generated short token (see [`new_message_id`]); both survive a
/// codec round-trip unchanged. Id uniqueness is best-effort — good enough for
/// correlating acks on a LAN control-plane of tens of machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    /// String-keyed scalar values; contents depend on `kind`.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Opaque endpoint identifier of the sender.
    ///
    /// The dispatcher overwrites this with the transport-observed peer
    /// address before any handler runs; the claimed value is never trusted.
    #[serde(default)]
    pub source: String,
    /// Opaque endpoint identifier of the addressee, or [`BROADCAST_TARGET`].
    #[serde(default)]
    pub target: String,
    pub timestamp: u64,
    pub id: String,
}

impl Message {
    /// Constructs a message with an empty payload.
    pub fn new(kind: MessageKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_payload(kind, Map::new(), source, target)
    }

    /// Constructs a message with the given payload.
    pub fn with_payload(
        kind: MessageKind,
        payload: Map<String, Value>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            payload,
            source: source.into(),
            target: target.into(),
            timestamp: now_millis(),
            id: new_message_id(),
        }
    }

    /// Builds a `discover` broadcast announcing the server's presence.
    pub fn discover(source: impl Into<String>) -> Self {
        Self::new(MessageKind::Discover, source, BROADCAST_TARGET)
    }

    /// Creates a response to this message.
    ///
    /// Source and target are swapped relative to the original, the response
    /// gets its own fresh id and timestamp, and the payload carries
    /// `original_message_id` so the peer can correlate it.
    pub fn response(&self, kind: MessageKind, mut payload: Map<String, Value>) -> Self {
        payload.insert(
            ORIGINAL_MESSAGE_ID_KEY.to_string(),
            Value::String(self.id.clone()),
        );
        Self::with_payload(kind, payload, self.target.clone(), self.source.clone())
    }

    /// Creates an `ack` response to this message.
    pub fn ack(&self) -> Self {
        self.response(MessageKind::Ack, Map::new())
    }

    /// Creates an `error` response carrying a human-readable reason under the
    /// `error` payload key.
    pub fn error_reply(&self, reason: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("error".to_string(), Value::String(reason.into()));
        self.response(MessageKind::Error, payload)
    }

    /// Returns the string value under `key` in the payload, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({}: {} -> {})", self.kind, self.id, self.source, self.target)
    }
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Tests ─────────────────────────────────────────────────────────────────────
