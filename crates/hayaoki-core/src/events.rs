//! Core events emitted by the engine

use chrono::NaiveDate;
use hayaoki_util::{ParticipantId, WallClock};

use crate::{DailyReport, DateRange};

/// Events emitted by the engine for the service to fan out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A check-in moved the ledger to a new day
    TrackingDayAdvanced { day: NaiveDate },

    /// Check-in recorded
    CheckedIn {
        participant: ParticipantId,
        day: NaiveDate,
        time: WallClock,
    },

    /// Exemption window registered
    ExemptionAdded {
        participant: ParticipantId,
        window: DateRange,
    },

    /// Daily report is ready to broadcast
    ReportReady { report: DailyReport, text: String },
}
