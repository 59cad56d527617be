//! Domain entities shared by the server and client agents.
//!
//! Pure data types with no socket, timer, or runtime dependencies.

pub mod status;

pub use status::{PcState, PcStatus};
