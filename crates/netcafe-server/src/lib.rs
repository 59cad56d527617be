//! netcafe-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod beacon;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod listener;
pub mod server;
pub mod store;

pub use commands::{CommandApi, CommandError};
pub use config::ServerConfig;
pub use server::{Server, ServerError, ServerHandle};
pub use store::{ConnectionHandle, StatusEvent, StatusStore};
