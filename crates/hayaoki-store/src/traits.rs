//! Ledger trait definitions

use chrono::NaiveDate;
use hayaoki_util::{ParticipantId, WallClock};

use crate::{AuditEvent, StoreResult};

/// A participant as seen for the current tracking day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRow {
    pub id: ParticipantId,
    /// Check-in time on the stored tracking day, if any
    pub check_in: Option<WallClock>,
}

/// The attendance ledger.
///
/// There are no transactions: callers that read-modify-write must serialize
/// themselves. Every value crossing this boundary is typed; a cell that does
/// not parse comes back as `StoreError::Corrupt`.
pub trait Ledger: Send + Sync {
    // Tracking day

    /// Day the ledger currently considers "today", if one was ever set
    fn read_tracking_day(&self) -> StoreResult<Option<NaiveDate>>;

    /// Move the tracking day to `today`. No-op when already current.
    fn advance_tracking_day(&self, today: NaiveDate) -> StoreResult<()>;

    // Participants

    /// All participants in join order, with check-ins for the tracking day
    fn read_participants(&self) -> StoreResult<Vec<ParticipantRow>>;

    /// Create the participant if missing
    fn ensure_participant(&self, id: &ParticipantId) -> StoreResult<()>;

    /// Set the participant's check-in time for the tracking day (last write wins)
    fn record_check_in(&self, id: &ParticipantId, at: WallClock) -> StoreResult<()>;

    // Exemptions

    /// Raw exemption string; empty for unknown participants
    fn read_exemptions(&self, id: &ParticipantId) -> StoreResult<String>;

    /// Replace the participant's raw exemption string
    fn write_exemptions(&self, id: &ParticipantId, raw: &str) -> StoreResult<()>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Most recent audit events, newest first
    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if the ledger is reachable
    fn is_healthy(&self) -> bool;
}
