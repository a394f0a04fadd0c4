//! In-process daily report trigger

use chrono::{DateTime, FixedOffset, NaiveDate};
use hayaoki_util::WallClock;

/// Fires at most once per local day, at or after the configured time
#[derive(Debug, Clone)]
pub struct ReportSchedule {
    at: WallClock,
    last_fired: Option<NaiveDate>,
}

impl ReportSchedule {
    /// A service started after today's slot does not fire for today
    pub fn new(at: WallClock, now: &DateTime<FixedOffset>) -> Self {
        let last_fired = (WallClock::of(now) >= at).then(|| now.date_naive());
        Self { at, last_fired }
    }

    pub fn at(&self) -> WallClock {
        self.at
    }

    pub fn last_fired(&self) -> Option<NaiveDate> {
        self.last_fired
    }

    /// Returns true, and marks the day, when the report is due
    pub fn due(&mut self, now: &DateTime<FixedOffset>) -> bool {
        let today = now.date_naive();
        if self.last_fired == Some(today) || WallClock::of(now) < self.at {
            return false;
        }
        self.last_fired = Some(today);
        true
    }
}
