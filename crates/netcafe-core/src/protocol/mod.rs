//! Network protocol: message envelope, JSON codec, and message-id generation.

pub mod codec;
pub mod ident;
pub mod messages;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use ident::new_message_id;
pub use messages::{Message, MessageKind, BROADCAST_TARGET};
