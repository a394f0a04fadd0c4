//! Protocol types for hayaokid IPC
//!
//! This crate defines the stable API between hayaokid and its front ends:
//! - Inbound slash-command parsing and the usage string
//! - Replies and their visibility class
//! - Requests, responses and broadcast events
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
