//! Attendance and exemption engine for hayaokid
//!
//! This crate is the heart of hayaokid, containing:
//! - Date expression parsing (`month/day[-month/day]` with year inference)
//! - Exemption interval sets and the closed-interval overlap rule
//! - Check-in and exemption services over the ledger
//! - The daily aggregation that classifies every participant
//! - Per-identity and rollover locks serializing ledger writes
//! - Request deadlines checked before every ledger write

mod aggregator;
mod checkin;
mod dateexpr;
mod deadline;
mod engine;
mod error;
mod events;
mod exemption;
mod interval;
mod locks;

pub use aggregator::*;
pub use checkin::*;
pub use dateexpr::*;
pub use deadline::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use exemption::*;
pub use interval::*;
pub use locks::*;
