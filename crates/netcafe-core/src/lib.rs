//! # netcafe-core
//!
//! Shared library for the netcafe control-plane containing the network
//! message protocol and the PC status domain model.
//!
//! This crate is used by the server and is suitable for client agents too.
//! It has zero dependencies on sockets, timers, or the async runtime.
//!
//! # Architecture overview
//!
//! netcafe manages a fleet of LAN-connected client workstations in a
//! managed-access facility: the server discovers clients via UDP broadcast,
//! receives live status reports over per-client TCP connections, and issues
//! remote commands (shutdown, lock, session control) back over the same
//! connections.
//!
//! This crate defines the two building blocks every other component shares:
//!
//! - **`protocol`** – the message envelope (`Message`, `MessageKind`), the
//!   JSON codec, and short message-id generation.
//!
//! - **`domain`** – the `PcStatus` record describing the last-known state of
//!   a single workstation, plus conversions to and from message payloads.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `netcafe_core::Message` instead of `netcafe_core::protocol::messages::Message`.
pub use domain::status::{PcState, PcStatus};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{Message, MessageKind, BROADCAST_TARGET};
