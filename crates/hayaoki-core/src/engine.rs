//! Attendance engine facade

use chrono::NaiveDate;
use hayaoki_api::{InboundCommand, Reply};
use hayaoki_config::{AttendancePolicy, ReportPolicy};
use hayaoki_store::{AuditEvent, AuditEventType, Ledger, StoreResult};
use hayaoki_util::{Clock, ParticipantId, format_tracking_day};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    AttendanceError, AttendanceResult, CHECK_IN_ACK, CheckInService, CoreEvent, DailyAggregator,
    DailyReport, Deadline, ExemptionService, IdentityLocks, render_exemption_list,
};

/// Private reply to `cancel` and `delete`
pub const CANCEL_UNSUPPORTED_REPLY: &str = "Cancelling kiken is not supported.";

/// Result of one inbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Private reply to the requester
    pub reply: Reply,
    /// Text to broadcast on the report channel
    pub notice: Option<String>,
    pub events: Vec<CoreEvent>,
}

impl CommandOutcome {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            notice: None,
            events: Vec::new(),
        }
    }

    fn rejected(err: &AttendanceError) -> Self {
        Self::reply(Reply::private(err.reply_text()))
    }
}

/// A rendered daily report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub report: DailyReport,
    pub text: String,
}

/// The attendance engine.
///
/// Stateless apart from the ledger: every method may be called from any
/// thread. Ledger calls block; async callers run them on blocking workers.
pub struct AttendanceEngine {
    report_policy: ReportPolicy,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    check_ins: CheckInService,
    exemptions: ExemptionService,
    aggregator: DailyAggregator,
}

impl AttendanceEngine {
    pub fn new(
        attendance: AttendancePolicy,
        report_policy: ReportPolicy,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = Arc::new(IdentityLocks::new());

        info!(
            zone = %attendance.zone,
            window = %attendance.check_in_window,
            channel = %report_policy.channel,
            "Attendance engine initialized"
        );

        Self {
            check_ins: CheckInService::new(
                attendance,
                ledger.clone(),
                clock.clone(),
                locks.clone(),
            ),
            exemptions: ExemptionService::new(attendance, ledger.clone(), clock.clone(), locks),
            aggregator: DailyAggregator::new(ledger.clone(), clock.clone()),
            report_policy,
            ledger,
            clock,
        }
    }

    pub fn report_policy(&self) -> &ReportPolicy {
        &self.report_policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Handle one slash command from `user`
    pub fn handle_command(&self, user: &ParticipantId, command: &InboundCommand) -> CommandOutcome {
        self.handle_command_within(user, command, Deadline::none())
    }

    /// Handle one slash command, starting no ledger write after `deadline`.
    ///
    /// A command that runs out of time fails like a storage error: generic
    /// reply, no notice, no events.
    pub fn handle_command_within(
        &self,
        user: &ParticipantId,
        command: &InboundCommand,
        deadline: Deadline,
    ) -> CommandOutcome {
        debug!(user = %user, command = ?command, "Handling command");

        match command {
            InboundCommand::CheckIn => self.check_in(user, deadline),
            InboundCommand::Exemption { token } => {
                self.exemption(user, token.as_deref(), deadline)
            }
            InboundCommand::List => self.list(user),
            InboundCommand::Cancel => {
                CommandOutcome::reply(Reply::private(CANCEL_UNSUPPORTED_REPLY))
            }
            InboundCommand::Invalid => CommandOutcome::reply(Reply::usage()),
        }
    }

    fn check_in(&self, user: &ParticipantId, deadline: Deadline) -> CommandOutcome {
        let check_in = match self.check_ins.check_in_within(user, deadline) {
            Ok(c) => c,
            Err(e) => return self.reject(user, e),
        };

        let day = format_tracking_day(check_in.day);
        let mut events = Vec::new();

        if check_in.rolled_over {
            self.audit(AuditEventType::TrackingDayAdvanced { day: day.clone() });
            events.push(CoreEvent::TrackingDayAdvanced { day: check_in.day });
        }

        self.audit(AuditEventType::CheckInRecorded {
            participant: user.clone(),
            day,
            time: check_in.time.to_string(),
        });

        events.push(CoreEvent::CheckedIn {
            participant: user.clone(),
            day: check_in.day,
            time: check_in.time,
        });

        CommandOutcome {
            reply: Reply::private(CHECK_IN_ACK),
            notice: Some(check_in.notice(&self.report_policy.name_suffix)),
            events,
        }
    }

    fn exemption(
        &self,
        user: &ParticipantId,
        token: Option<&str>,
        deadline: Deadline,
    ) -> CommandOutcome {
        let exemption = match self.exemptions.request_within(user, token, deadline) {
            Ok(e) => e,
            Err(e) => return self.reject(user, e),
        };

        self.audit(AuditEventType::ExemptionRecorded {
            participant: user.clone(),
            window: exemption.window.to_string(),
        });

        CommandOutcome {
            reply: Reply::private(exemption.ack()),
            notice: Some(exemption.notice(&self.report_policy.name_suffix)),
            events: vec![CoreEvent::ExemptionAdded {
                participant: user.clone(),
                window: exemption.window,
            }],
        }
    }

    fn list(&self, user: &ParticipantId) -> CommandOutcome {
        match self.exemptions.list(user) {
            Ok(set) => CommandOutcome::reply(Reply::private(render_exemption_list(&set))),
            Err(e) => self.reject(user, e),
        }
    }

    fn reject(&self, user: &ParticipantId, err: AttendanceError) -> CommandOutcome {
        if err.is_storage() {
            error!(user = %user, error = %err, "Ledger failure while handling command");
        } else {
            info!(user = %user, reason = %err, "Command rejected");
            self.audit(AuditEventType::RequestRejected {
                participant: user.clone(),
                reason: err.to_string(),
            });
        }
        CommandOutcome::rejected(&err)
    }

    /// Classify today's participants and render the report. Read-only; safe
    /// to run more than once a day.
    pub fn run_daily_report(&self) -> AttendanceResult<ReportOutcome> {
        let report = self.aggregator.run()?;
        let text = report.message(&self.report_policy.name_suffix);

        self.audit(AuditEventType::ReportSent {
            day: format_tracking_day(report.day),
            succeeded: report.succeeded.clone(),
            exempted: report.exempted.clone(),
            failed: report.failed.clone(),
        });

        info!(day = %report.day, text = %text, "Daily report rendered");

        Ok(ReportOutcome { report, text })
    }

    pub fn tracking_day(&self) -> StoreResult<Option<NaiveDate>> {
        self.ledger.read_tracking_day()
    }

    pub fn ledger_healthy(&self) -> bool {
        self.ledger.is_healthy()
    }

    /// Append to the audit log; failures are logged and otherwise ignored
    pub fn audit(&self, event: AuditEventType) {
        if let Err(e) = self
            .ledger
            .append_audit(AuditEvent::new(self.clock.now(), event))
        {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}
