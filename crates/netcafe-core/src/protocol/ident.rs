//! Short message-id generation.
//!
//! Every [`crate::Message`] carries an 8-character hex token taken from a
//! freshly generated v4 UUID. Uniqueness is best-effort: with tens of
//! machines on a LAN and ids only used to correlate a response with its
//! request, 32 bits of randomness is plenty, and the short form keeps log
//! lines and wire frames readable. Collisions are not defended against.

use uuid::Uuid;

/// Length of a message id in characters.
pub const MESSAGE_ID_LEN: usize = 8;

/// Generates a new message id: the first 8 hex digits of a random UUID.
pub fn new_message_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..MESSAGE_ID_LEN].to_string()
}
