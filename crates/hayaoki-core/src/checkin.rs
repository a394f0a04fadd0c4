//! Daily check-in

use chrono::NaiveDate;
use hayaoki_config::AttendancePolicy;
use hayaoki_store::Ledger;
use hayaoki_util::{Clock, ParticipantId, WallClock};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{AttendanceError, AttendanceResult, Deadline, IdentityLocks};

/// Private acknowledgement for a recorded check-in
pub const CHECK_IN_ACK: &str = "Hayaoki accepted!";

/// A check-in that reached the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub participant: ParticipantId,
    pub day: NaiveDate,
    pub time: WallClock,
    /// This check-in moved the ledger to a new tracking day
    pub rolled_over: bool,
}

impl CheckIn {
    /// Broadcast notice
    pub fn notice(&self, name_suffix: &str) -> String {
        format!("{}{}が早起きに成功しました。", self.participant, name_suffix)
    }
}

/// Move the ledger to `today` if it still tracks an earlier day.
///
/// Returns whether the tracking day changed.
pub fn ensure_tracking_day(
    ledger: &dyn Ledger,
    locks: &IdentityLocks,
    today: NaiveDate,
    deadline: Deadline,
) -> AttendanceResult<bool> {
    locks.with_rollover(|| -> AttendanceResult<bool> {
        if ledger.read_tracking_day()? == Some(today) {
            return Ok(false);
        }
        deadline.check()?;
        ledger.advance_tracking_day(today)?;
        info!(day = %today, "Tracking day advanced");
        Ok(true)
    })
}

/// Validates and records check-ins
pub struct CheckInService {
    policy: AttendancePolicy,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    locks: Arc<IdentityLocks>,
}

impl CheckInService {
    pub fn new(
        policy: AttendancePolicy,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
        locks: Arc<IdentityLocks>,
    ) -> Self {
        Self {
            policy,
            ledger,
            clock,
            locks,
        }
    }

    /// Record a check-in for `participant` at the current local time
    pub fn check_in(&self, participant: &ParticipantId) -> AttendanceResult<CheckIn> {
        self.check_in_within(participant, Deadline::none())
    }

    /// As `check_in`, starting no ledger write after `deadline`
    pub fn check_in_within(
        &self,
        participant: &ParticipantId,
        deadline: Deadline,
    ) -> AttendanceResult<CheckIn> {
        let now = self.clock.now();
        let window = self.policy.check_in_window;

        if !window.contains(&now) {
            debug!(participant = %participant, time = %now.time(), "Check-in outside window");
            return Err(AttendanceError::OutOfWindow { window });
        }

        let day = now.date_naive();
        let time = WallClock::of(&now);

        let rolled_over = ensure_tracking_day(self.ledger.as_ref(), &self.locks, day, deadline)?;

        self.locks.with_identity(participant, || -> AttendanceResult<()> {
            deadline.check()?;
            self.ledger.ensure_participant(participant)?;
            deadline.check()?;
            self.ledger.record_check_in(participant, time)?;
            Ok(())
        })?;

        info!(participant = %participant, day = %day, time = %time, "Check-in recorded");

        Ok(CheckIn {
            participant: participant.clone(),
            day,
            time,
            rolled_over,
        })
    }
}
