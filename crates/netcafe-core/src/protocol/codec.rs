//! JSON codec for encoding and decoding netcafe protocol messages.
//!
//! Wire format: one self-describing JSON object per logical message, with the
//! stable field names `kind`, `payload`, `source`, `target`, `timestamp`,
//! `id`. The codec deals in complete frames only; delimiting frames on a
//! stream (one object per newline-terminated line) is the transport's job.
//!
//! Decoding never regenerates `id` or `timestamp` — a decoded message is
//! byte-for-byte the message the peer constructed.

use thiserror::Error;

use crate::protocol::messages::Message;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The bytes are not a valid serialized message: invalid JSON, invalid
    /// UTF-8, a missing required field, or a `kind` outside the fixed
    /// enumeration.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

/// Encodes a [`Message`] into its JSON wire form, without a trailing
/// delimiter.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedMessage`] if serialization fails, which
/// only happens for non-string payload keys or non-finite floats smuggled
/// into the payload.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(msg).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

/// Decodes one [`Message`] from a complete frame.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedMessage`] if `bytes` is not a valid
/// serialized message or its `kind` is not a recognized value.
///
/// # Examples
///
/// ```rust
/// use netcafe_core::{decode_message, encode_message, Message, MessageKind};
///
/// let original = Message::new(MessageKind::StatusRequest, "server", "10.0.0.5");
/// let bytes = encode_message(&original).unwrap();
/// let decoded = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, original);
/// ```
pub fn decode_message(bytes: &[u8]) -> Result<Message, ProtocolError> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
