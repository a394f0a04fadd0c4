//! Audit event types

use chrono::{DateTime, FixedOffset};
use hayaoki_util::ParticipantId;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Ledger rolled to a new tracking day
    TrackingDayAdvanced { day: String },

    /// Check-in written
    CheckInRecorded {
        participant: ParticipantId,
        day: String,
        time: String,
    },

    /// Exemption appended, formatted as stored
    ExemptionRecorded {
        participant: ParticipantId,
        window: String,
    },

    /// Request refused before any write
    RequestRejected {
        participant: ParticipantId,
        reason: String,
    },

    /// Daily report rendered and handed to the notifier
    ReportSent {
        day: String,
        succeeded: Vec<ParticipantId>,
        exempted: Vec<ParticipantId>,
        failed: Vec<ParticipantId>,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID, assigned by the store
    pub id: i64,

    /// Event timestamp in the configured zone
    pub timestamp: DateTime<FixedOffset>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(timestamp: DateTime<FixedOffset>, event: AuditEventType) -> Self {
        Self {
            id: 0,
            timestamp,
            event,
        }
    }
}
