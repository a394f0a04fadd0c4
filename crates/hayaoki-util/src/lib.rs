//! Shared utilities for hayaoki
//!
//! This crate provides:
//! - ID types (ParticipantId, ClientId)
//! - Clocks bound to the configured local zone, wall-clock and daily window types
//! - The text formats used in ledger cells
//! - Rate limiting helpers
//! - Default paths for socket, config and data directories

mod format;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use format::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
