//! Daily classification and report

use chrono::NaiveDate;
use hayaoki_store::{Ledger, ParticipantRow};
use hayaoki_util::{Clock, ParticipantId};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{AttendanceResult, IntervalSet};

/// Report text when there is nobody to pay or nobody to be paid
pub const NO_PENALTY_MESSAGE: &str = "本日の飲み物提供はありません。";

/// Where a participant lands for the day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Succeeded,
    Exempted,
    Failed,
}

/// Every participant in exactly one bucket, each in ledger order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub day: NaiveDate,
    pub succeeded: Vec<ParticipantId>,
    pub exempted: Vec<ParticipantId>,
    pub failed: Vec<ParticipantId>,
}

impl DailyReport {
    /// Classify participants for `today`.
    ///
    /// A check-in only counts if it belongs to `today`, i.e. the ledger's
    /// tracking day has been advanced to it.
    pub fn classify(
        today: NaiveDate,
        tracking_day: Option<NaiveDate>,
        participants: Vec<(ParticipantRow, IntervalSet)>,
    ) -> Self {
        let current = tracking_day == Some(today);
        let mut report = DailyReport {
            day: today,
            succeeded: Vec::new(),
            exempted: Vec::new(),
            failed: Vec::new(),
        };

        for (row, exemptions) in participants {
            let standing = if current && row.check_in.is_some() {
                Standing::Succeeded
            } else if exemptions.contains(today) {
                Standing::Exempted
            } else {
                Standing::Failed
            };

            match standing {
                Standing::Succeeded => report.succeeded.push(row.id),
                Standing::Exempted => report.exempted.push(row.id),
                Standing::Failed => report.failed.push(row.id),
            }
        }

        report
    }

    pub fn standing_of(&self, id: &ParticipantId) -> Option<Standing> {
        if self.succeeded.contains(id) {
            Some(Standing::Succeeded)
        } else if self.exempted.contains(id) {
            Some(Standing::Exempted)
        } else if self.failed.contains(id) {
            Some(Standing::Failed)
        } else {
            None
        }
    }

    /// Broadcast text. Failed participants owe the succeeded ones a drink.
    pub fn message(&self, name_suffix: &str) -> String {
        if self.failed.is_empty() || self.succeeded.is_empty() {
            return NO_PENALTY_MESSAGE.to_string();
        }

        let join = |ids: &[ParticipantId]| {
            ids.iter()
                .map(|id| format!("{}{}", id, name_suffix))
                .collect::<Vec<_>>()
                .join(",")
        };

        format!(
            "{}は{}に飲み物を提供してください。",
            join(&self.failed),
            join(&self.succeeded)
        )
    }
}

/// Reads the ledger and builds the day's report. Never writes.
pub struct DailyAggregator {
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
}

impl DailyAggregator {
    pub fn new(ledger: Arc<dyn Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    pub fn run(&self) -> AttendanceResult<DailyReport> {
        let today = self.clock.today();
        self.collect(today).inspect_err(|e| {
            error!(day = %today, error = %e, "Daily aggregation failed");
        })
    }

    fn collect(&self, today: NaiveDate) -> AttendanceResult<DailyReport> {
        let tracking_day = self.ledger.read_tracking_day()?;
        let rows = self.ledger.read_participants()?;

        let mut participants = Vec::with_capacity(rows.len());
        for row in rows {
            let exemptions = IntervalSet::parse(&self.ledger.read_exemptions(&row.id)?)?;
            participants.push((row, exemptions));
        }

        debug!(
            day = %today,
            tracking_day = ?tracking_day,
            participants = participants.len(),
            "Classifying participants"
        );

        let report = DailyReport::classify(today, tracking_day, participants);

        info!(
            day = %today,
            succeeded = report.succeeded.len(),
            exempted = report.exempted.len(),
            failed = report.failed.len(),
            "Daily report built"
        );

        Ok(report)
    }
}
