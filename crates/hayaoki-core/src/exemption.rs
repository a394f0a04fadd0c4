//! Exemption (kiken) registration

use hayaoki_config::AttendancePolicy;
use hayaoki_store::Ledger;
use hayaoki_util::{Clock, ParticipantId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{AttendanceResult, DateExpr, DateRange, Deadline, IdentityLocks, IntervalSet};

/// Private reply to `list` when nothing is registered
pub const NO_EXEMPTIONS_REPLY: &str = "No kiken registered.";

/// An exemption that reached the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exemption {
    pub participant: ParticipantId,
    pub window: DateRange,
}

impl Exemption {
    /// Broadcast notice describing the window
    pub fn notice(&self, name_suffix: &str) -> String {
        format!(
            "{}{}が{}棄権します。",
            self.participant,
            name_suffix,
            self.window.notice_phrase()
        )
    }

    /// Private acknowledgement
    pub fn ack(&self) -> String {
        format!("Kiken accepted!\n Date: {}", self.window)
    }
}

/// Validates and records exemption windows
pub struct ExemptionService {
    policy: AttendancePolicy,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    locks: Arc<IdentityLocks>,
}

impl ExemptionService {
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

    /// Resolve the requested window without touching the ledger.
    /// No token means today.
    pub fn resolve(&self, token: Option<&str>) -> AttendanceResult<DateRange> {
        let now = self.clock.now();
        match token {
            None => Ok(DateRange::single(now.date_naive())),
            Some(token) => DateExpr::parse(token, &now, self.policy.year_roll_time)?.into_range(),
        }
    }

    /// Register an exemption for `participant`
    pub fn request(
        &self,
        participant: &ParticipantId,
        token: Option<&str>,
    ) -> AttendanceResult<Exemption> {
        self.request_within(participant, token, Deadline::none())
    }

    /// As `request`, starting no ledger write after `deadline`
    pub fn request_within(
        &self,
        participant: &ParticipantId,
        token: Option<&str>,
        deadline: Deadline,
    ) -> AttendanceResult<Exemption> {
        let window = self.resolve(token)?;

        self.locks.with_identity(participant, || -> AttendanceResult<()> {
            deadline.check()?;
            self.ledger.ensure_participant(participant)?;

            let mut set = IntervalSet::parse(&self.ledger.read_exemptions(participant)?)?;
            if let Err(e) = set.append(window) {
                debug!(participant = %participant, window = %window, "Exemption overlaps");
                return Err(e);
            }

            deadline.check()?;
            self.ledger
                .write_exemptions(participant, &set.to_ledger_string())?;
            Ok(())
        })?;

        info!(participant = %participant, window = %window, "Exemption recorded");

        Ok(Exemption {
            participant: participant.clone(),
            window,
        })
    }

    /// Registered windows for `participant`, in insertion order
    pub fn list(&self, participant: &ParticipantId) -> AttendanceResult<IntervalSet> {
        Ok(IntervalSet::parse(&self.ledger.read_exemptions(participant)?)?)
    }
}

/// Private reply for `list`
pub fn render_exemption_list(set: &IntervalSet) -> String {
    if set.is_empty() {
        return NO_EXEMPTIONS_REPLY.to_string();
    }
    set.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttendanceError;
    use chrono::NaiveDate;
    use hayaoki_store::SqliteLedger;
    use hayaoki_util::FixedClock;

    fn service() -> (ExemptionService, Arc<SqliteLedger>) {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let policy = AttendancePolicy::default();
        let clock = Arc::new(FixedClock::at(policy.zone, (2024, 3, 10), (9, 0)).unwrap());
        let service = ExemptionService::new(
            policy,
            ledger.clone(),
            clock,
            Arc::new(IdentityLocks::new()),
        );
        (service, ledger)
    }

    #[test]
    fn bare_kiken_means_today() {
        let (service, ledger) = service();
        let bob = ParticipantId::new("Bob");

        let exemption = service.request(&bob, None).unwrap();
        assert_eq!(exemption.ack(), "Kiken accepted!\n Date: 2024/03/10");
        assert_eq!(exemption.notice("さん"), "Bobさんが03月10日に棄権します。");
        assert_eq!(ledger.read_exemptions(&bob).unwrap(), "2024/03/10");
    }

    #[test]
    fn range_is_appended() {
        let (service, ledger) = service();
        let bob = ParticipantId::new("Bob");

        service.request(&bob, None).unwrap();
        let exemption = service.request(&bob, Some("3/20-3/22")).unwrap();
        assert_eq!(
            exemption.ack(),
            "Kiken accepted!\n Date: 2024/03/20-2024/03/22"
        );
        assert_eq!(
            exemption.notice("さん"),
            "Bobさんが03月20日から03月22日の間棄権します。"
        );
        assert_eq!(
            ledger.read_exemptions(&bob).unwrap(),
            "2024/03/10,2024/03/20-2024/03/22"
        );
    }

    #[test]
    fn overlap_leaves_ledger_unchanged() {
        let (service, ledger) = service();
        let bob = ParticipantId::new("Bob");

        service.request(&bob, Some("3/20-3/22")).unwrap();
        let err = service.request(&bob, Some("3/22")).unwrap_err();
        assert!(matches!(err, AttendanceError::Overlap));
        assert_eq!(
            err.reply_text(),
            "date already covered by an existing exemption"
        );
        assert_eq!(ledger.read_exemptions(&bob).unwrap(), "2024/03/20-2024/03/22");

        // Adjacent is fine
        service.request(&bob, Some("3/23")).unwrap();
    }

    #[test]
    fn invalid_range_writes_nothing() {
        let (service, ledger) = service();
        let bob = ParticipantId::new("Bob");

        assert!(matches!(
            service.request(&bob, Some("3/15-3/12")),
            Err(AttendanceError::InvalidRange { .. })
        ));
        assert!(matches!(
            service.request(&bob, Some("tomorrow")),
            Err(AttendanceError::Parse { .. })
        ));
        assert!(ledger.read_participants().unwrap().is_empty());
    }

    #[test]
    fn expired_deadline_stops_before_the_ledger() {
        let (service, ledger) = service();
        let bob = ParticipantId::new("Bob");
        let expired = Deadline::at(std::time::Instant::now());
        std::thread::sleep(std::time::Duration::from_millis(2));

        assert!(matches!(
            service.request_within(&bob, Some("3/20"), expired),
            Err(AttendanceError::DeadlineExceeded)
        ));
        assert!(ledger.read_participants().unwrap().is_empty());
        assert_eq!(ledger.read_exemptions(&bob).unwrap(), "");
    }

    #[test]
    fn past_date_is_next_year() {
        let (service, _) = service();
        let window = service.resolve(Some("3/1")).unwrap();
        assert_eq!(window.start(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    }

    #[test]
    fn list_renders_one_per_line() {
        let (service, _) = service();
        let bob = ParticipantId::new("Bob");

        assert_eq!(
            render_exemption_list(&service.list(&bob).unwrap()),
            NO_EXEMPTIONS_REPLY
        );

        service.request(&bob, Some("3/12")).unwrap();
        service.request(&bob, Some("4/1-4/3")).unwrap();
        assert_eq!(
            render_exemption_list(&service.list(&bob).unwrap()),
            "2024/03/12\n2024/04/01-2024/04/03"
        );
    }
}
