//! Errors surfaced to requesters

use chrono::NaiveDate;
use hayaoki_api::USAGE;
use hayaoki_store::StoreError;
use hayaoki_util::{DailyWindow, format_ledger_date};
use thiserror::Error;

/// Generic reply for storage failures; details go to the log only
pub const STORAGE_FAILURE_REPLY: &str = "Internal error. Please try again later.";

/// Reply for an exemption that intersects one already registered
pub const OVERLAP_REPLY: &str = "date already covered by an existing exemption";

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("cannot parse date expression {token:?}")]
    Parse { token: String },

    #[error("exemption overlaps an existing one")]
    Overlap,

    #[error("range start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("check-in outside {window}")]
    OutOfWindow { window: DailyWindow },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("storage deadline exceeded before writing")]
    DeadlineExceeded,
}

impl AttendanceError {
    pub fn parse(token: impl Into<String>) -> Self {
        AttendanceError::Parse {
            token: token.into(),
        }
    }

    /// Text sent privately to the requester
    pub fn reply_text(&self) -> String {
        match self {
            AttendanceError::Parse { .. } => format!("Invalid format.\n{}", USAGE),
            AttendanceError::Overlap => OVERLAP_REPLY.to_string(),
            AttendanceError::InvalidRange { start, end } => format!(
                "Invalid range.\n Date: {}-{}",
                format_ledger_date(*start),
                format_ledger_date(*end)
            ),
            AttendanceError::OutOfWindow { window } => {
                format!("Please type /hayaoki between {}", window)
            }
            AttendanceError::Storage(_) | AttendanceError::DeadlineExceeded => {
                STORAGE_FAILURE_REPLY.to_string()
            }
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AttendanceError::Storage(_) | AttendanceError::DeadlineExceeded
        )
    }
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;
