//! Integration tests for hayaokid
//!
//! These tests drive the attendance engine end to end against a real ledger.

use hayaoki_api::{InboundCommand, Visibility};
use hayaoki_config::{Settings, parse_config};
use chrono::NaiveDate;
use hayaoki_core::{
    AttendanceEngine, CommandOutcome, CoreEvent, STORAGE_FAILURE_REPLY, Standing,
};
use hayaoki_store::{
    AuditEvent, AuditEventType, Ledger, ParticipantRow, SqliteLedger, StoreError, StoreResult,
};
use hayaoki_util::{Clock, FixedClock, ParticipantId, WallClock};
use std::sync::Arc;
use std::thread;

struct Harness {
    engine: Arc<AttendanceEngine>,
    ledger: Arc<SqliteLedger>,
    clock: Arc<FixedClock>,
}

impl Harness {
    fn at(settings: &Settings, date: (i32, u32, u32), time: (u32, u32)) -> Self {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let clock = Arc::new(FixedClock::at(settings.attendance.zone, date, time).unwrap());
        let engine = Arc::new(AttendanceEngine::new(
            settings.attendance,
            settings.report.clone(),
            ledger.clone(),
            clock.clone(),
        ));
        Self {
            engine,
            ledger,
            clock,
        }
    }

    fn new(date: (i32, u32, u32), time: (u32, u32)) -> Self {
        Self::at(&Settings::default(), date, time)
    }

    fn send(&self, user: &str, text: &str) -> CommandOutcome {
        self.engine
            .handle_command(&ParticipantId::new(user), &InboundCommand::parse(text))
    }

    fn set_time(&self, h: u32, m: u32) {
        let now = self.clock.now();
        let date = now.date_naive();
        let naive = date.and_hms_opt(h, m, 0).unwrap();
        self.clock
            .set(naive.and_local_timezone(*now.offset()).single().unwrap());
    }

    fn check_in_cell(&self, user: &str) -> Option<String> {
        self.ledger
            .read_participants()
            .unwrap()
            .into_iter()
            .find(|row| row.id.as_str() == user)
            .and_then(|row| row.check_in)
            .map(|t| t.to_string())
    }

    fn exemptions(&self, user: &str) -> String {
        self.ledger.read_exemptions(&ParticipantId::new(user)).unwrap()
    }
}

#[test]
fn test_check_in_scenario() {
    let h = Harness::new((2024, 3, 10), (7, 10));

    let outcome = h.send("Alice", "");

    assert_eq!(outcome.reply.text, "Hayaoki accepted!");
    assert_eq!(outcome.reply.visibility, Visibility::Ephemeral);
    assert_eq!(
        outcome.notice.as_deref(),
        Some("Aliceさんが早起きに成功しました。")
    );
    assert_eq!(h.check_in_cell("Alice").as_deref(), Some("07:10"));
    assert_eq!(
        h.ledger.read_tracking_day().unwrap(),
        chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
    );
}

#[test]
fn test_kiken_today_scenario() {
    let h = Harness::new((2024, 3, 10), (12, 0));

    let outcome = h.send("Bob", "kiken");

    assert!(outcome.reply.text.contains("2024/03/10"));
    assert_eq!(outcome.reply.text, "Kiken accepted!\n Date: 2024/03/10");
    assert_eq!(h.exemptions("Bob"), "2024/03/10");
    assert_eq!(
        outcome.notice.as_deref(),
        Some("Bobさんが03月10日に棄権します。")
    );
}

#[test]
fn test_daily_report_scenario() {
    let h = Harness::new((2024, 3, 10), (7, 0));

    h.send("Alice", "");
    h.send("Bob", "kiken");
    h.send("Carol", "kiken 3/20");

    h.set_time(8, 40);
    let outcome = h.engine.run_daily_report().unwrap();

    let report = &outcome.report;
    assert_eq!(
        report.standing_of(&ParticipantId::new("Alice")),
        Some(Standing::Succeeded)
    );
    assert_eq!(
        report.standing_of(&ParticipantId::new("Bob")),
        Some(Standing::Exempted)
    );
    assert_eq!(
        report.standing_of(&ParticipantId::new("Carol")),
        Some(Standing::Failed)
    );
    assert_eq!(
        outcome.text,
        "CarolさんはAliceさんに飲み物を提供してください。"
    );
    assert!(!outcome.text.contains("Bob"));
}

#[test]
fn test_early_check_in_is_refused() {
    let h = Harness::new((2024, 3, 10), (5, 59));

    let outcome = h.send("Alice", "");

    assert_eq!(
        outcome.reply.text,
        "Please type /hayaoki between 6:00 and 8:35"
    );
    assert!(outcome.notice.is_none());
    assert!(h.ledger.read_tracking_day().unwrap().is_none());
    assert!(h.ledger.read_participants().unwrap().is_empty());
}

#[test]
fn test_reversed_range_is_refused() {
    let h = Harness::new((2024, 3, 1), (12, 0));

    let outcome = h.send("Dave", "kiken 3/10-3/5");

    assert_eq!(
        outcome.reply.text,
        "Invalid range.\n Date: 2024/03/10-2024/03/05"
    );
    assert!(outcome.notice.is_none());
    assert!(outcome.events.is_empty());
    assert!(h.ledger.read_participants().unwrap().is_empty());
}

#[test]
fn test_overlapping_kiken_leaves_ledger_unchanged() {
    let h = Harness::new((2024, 2, 20), (12, 0));

    h.send("Bob", "kiken 3/1-3/5");
    let before = h.exemptions("Bob");

    let outcome = h.send("Bob", "kiken 3/5-3/10");
    assert_eq!(
        outcome.reply.text,
        "date already covered by an existing exemption"
    );
    assert!(outcome.notice.is_none());
    assert_eq!(h.exemptions("Bob"), before);

    let outcome = h.send("Bob", "kiken 3/6-3/10");
    assert_eq!(
        outcome.reply.text,
        "Kiken accepted!\n Date: 2024/03/06-2024/03/10"
    );
    assert_eq!(h.exemptions("Bob"), "2024/03/01-2024/03/05,2024/03/06-2024/03/10");
}

#[test]
fn test_list_cancel_and_usage() {
    let h = Harness::new((2024, 3, 1), (12, 0));

    assert_eq!(h.send("Bob", "list").reply.text, "No kiken registered.");

    h.send("Bob", "kiken 3/2");
    h.send("Bob", "kiken 4/1-4/2");
    assert_eq!(
        h.send("Bob", "list").reply.text,
        "2024/03/02\n2024/04/01-2024/04/02"
    );

    let cancel = h.send("Bob", "cancel 3/2");
    assert_eq!(cancel.reply.visibility, Visibility::Ephemeral);
    assert!(cancel.reply.text.contains("not supported"));
    assert_eq!(h.exemptions("Bob"), "2024/03/02,2024/04/01-2024/04/02");

    for text in ["hayaoki", "kiken 3/2 3/3", " ", "kiken  3/2"] {
        let outcome = h.send("Bob", text);
        assert_eq!(
            outcome.reply.text,
            "Invalid format.\nUsage: /hayaoki [kiken|cancel|list] [month/day[-month/day]]",
            "{:?}",
            text
        );
    }
}

#[test]
fn test_new_day_resets_check_ins() {
    let h = Harness::new((2024, 3, 10), (7, 0));
    h.send("Alice", "");
    h.send("Bob", "");

    h.clock.advance(chrono::Duration::days(1));

    // Before anyone checks in on the 11th, yesterday's check-ins do not count
    let report = h.engine.run_daily_report().unwrap().report;
    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 2);

    let outcome = h.send("Bob", "");
    assert!(
        outcome
            .events
            .iter()
            .any(|e| matches!(e, CoreEvent::TrackingDayAdvanced { .. }))
    );
    assert_eq!(h.check_in_cell("Alice"), None);
    assert_eq!(h.check_in_cell("Bob").as_deref(), Some("07:00"));

    let report = h.engine.run_daily_report().unwrap().report;
    assert_eq!(report.succeeded, vec![ParticipantId::new("Bob")]);
    assert_eq!(report.failed, vec![ParticipantId::new("Alice")]);
}

#[test]
fn test_year_inference_at_year_end() {
    let h = Harness::new((2024, 12, 30), (12, 0));

    let outcome = h.send("Bob", "kiken 12/31-1/2");
    assert_eq!(
        outcome.reply.text,
        "Kiken accepted!\n Date: 2024/12/31-2025/01/02"
    );

    let outcome = h.send("Carol", "kiken 12/30");
    assert_eq!(outcome.reply.text, "Kiken accepted!\n Date: 2025/12/30");
}

#[test]
fn test_configured_policy_flows_through() {
    let settings = parse_config(
        r#"
        config_version = 1

        [attendance]
        utc_offset = "+00:00"
        window_start = "05:00"
        cutoff = "07:00"

        [report]
        name_suffix = "-san"
        "#,
    )
    .unwrap();

    let h = Harness::at(&settings, (2024, 3, 10), (5, 30));
    assert_eq!(
        h.send("Alice", "").notice.as_deref(),
        Some("Alice-sanが早起きに成功しました。")
    );

    h.set_time(7, 0);
    assert_eq!(
        h.send("Bob", "").reply.text,
        "Please type /hayaoki between 5:00 and 7:00"
    );
    h.send("Bob", "kiken 3/20");
    h.send("Carol", "kiken");

    let outcome = h.engine.run_daily_report().unwrap();
    assert_eq!(outcome.report.failed, vec![ParticipantId::new("Bob")]);
    assert_eq!(outcome.report.exempted, vec![ParticipantId::new("Carol")]);
    assert_eq!(outcome.text, "Bob-sanはAlice-sanに飲み物を提供してください。");
}

#[test]
fn test_concurrent_requests() {
    let h = Harness::new((2024, 3, 10), (7, 0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = h.engine.clone();
            thread::spawn(move || {
                let user = ParticipantId::new(format!("user{}", i));
                let check_in = engine.handle_command(&user, &InboundCommand::CheckIn);
                let kiken = engine.handle_command(
                    &user,
                    &InboundCommand::Exemption {
                        token: Some("3/20".into()),
                    },
                );
                (check_in, kiken)
            })
        })
        .collect();

    for handle in handles {
        let (check_in, kiken) = handle.join().unwrap();
        assert_eq!(check_in.reply.text, "Hayaoki accepted!");
        assert!(kiken.reply.text.starts_with("Kiken accepted!"));
    }

    let rows = h.ledger.read_participants().unwrap();
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().all(|row| row.check_in == WallClock::new(7, 0)));

    // The same participant racing on overlapping windows: exactly one wins
    let racers: Vec<_> = (0..4)
        .map(|_| {
            let engine = h.engine.clone();
            thread::spawn(move || {
                engine
                    .handle_command(
                        &ParticipantId::new("Zed"),
                        &InboundCommand::Exemption {
                            token: Some("4/1-4/3".into()),
                        },
                    )
                    .notice
                    .is_some()
            })
        })
        .collect();
    let accepted = racers
        .into_iter()
        .map(|r| r.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(h.exemptions("Zed"), "2024/04/01-2024/04/03");
}

#[test]
fn test_audit_trail() {
    let h = Harness::new((2024, 3, 10), (7, 0));
    h.send("Alice", "");
    h.send("Bob", "kiken 3/10-3/12");
    h.send("Bob", "kiken 3/11");
    h.engine.run_daily_report().unwrap();

    let events: Vec<_> = h
        .ledger
        .recent_audits(10)
        .unwrap()
        .into_iter()
        .rev()
        .map(|e| e.event)
        .collect();

    assert!(matches!(events[0], AuditEventType::TrackingDayAdvanced { .. }));
    assert!(matches!(events[1], AuditEventType::CheckInRecorded { .. }));
    assert!(matches!(events[2], AuditEventType::ExemptionRecorded { .. }));
    assert!(matches!(events[3], AuditEventType::RequestRejected { .. }));
    assert!(matches!(events[4], AuditEventType::ReportSent { .. }));
}

#[test]
fn test_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let settings = Settings::default();
    let clock = Arc::new(FixedClock::at(settings.attendance.zone, (2024, 3, 10), (7, 0)).unwrap());

    {
        let ledger = Arc::new(SqliteLedger::open(&path).unwrap());
        let engine = AttendanceEngine::new(
            settings.attendance,
            settings.report.clone(),
            ledger,
            clock.clone(),
        );
        engine.handle_command(&ParticipantId::new("Alice"), &InboundCommand::CheckIn);
        engine.handle_command(
            &ParticipantId::new("Bob"),
            &InboundCommand::Exemption { token: None },
        );
    }

    let ledger = Arc::new(SqliteLedger::open(&path).unwrap());
    let engine = AttendanceEngine::new(settings.attendance, settings.report, ledger, clock);
    let outcome = engine.run_daily_report().unwrap();
    assert_eq!(outcome.report.succeeded, vec![ParticipantId::new("Alice")]);
    assert_eq!(outcome.report.exempted, vec![ParticipantId::new("Bob")]);
    assert_eq!(outcome.text, "本日の飲み物提供はありません。");
}

/// Ledger whose check-in and exemption writes always fail
struct FailingLedger {
    inner: SqliteLedger,
}

impl FailingLedger {
    fn failure() -> StoreError {
        StoreError::Database("disk I/O error".into())
    }
}

impl Ledger for FailingLedger {
    fn read_tracking_day(&self) -> StoreResult<Option<NaiveDate>> {
        self.inner.read_tracking_day()
    }

    fn advance_tracking_day(&self, today: NaiveDate) -> StoreResult<()> {
        self.inner.advance_tracking_day(today)
    }

    fn read_participants(&self) -> StoreResult<Vec<ParticipantRow>> {
        self.inner.read_participants()
    }

    fn ensure_participant(&self, id: &ParticipantId) -> StoreResult<()> {
        self.inner.ensure_participant(id)
    }

    fn record_check_in(&self, _id: &ParticipantId, _at: WallClock) -> StoreResult<()> {
        Err(Self::failure())
    }

    fn read_exemptions(&self, id: &ParticipantId) -> StoreResult<String> {
        self.inner.read_exemptions(id)
    }

    fn write_exemptions(&self, _id: &ParticipantId, _raw: &str) -> StoreResult<()> {
        Err(Self::failure())
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        self.inner.append_audit(event)
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.inner.recent_audits(limit)
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }
}

#[test]
fn test_ledger_failures_reach_the_requester_as_generic_errors() {
    let settings = Settings::default();
    let ledger = Arc::new(FailingLedger {
        inner: SqliteLedger::in_memory().unwrap(),
    });
    let clock = Arc::new(FixedClock::at(settings.attendance.zone, (2024, 3, 10), (7, 10)).unwrap());
    let engine = AttendanceEngine::new(
        settings.attendance,
        settings.report.clone(),
        ledger.clone(),
        clock,
    );

    for (user, text) in [("Alice", ""), ("Bob", "kiken 3/20")] {
        let outcome =
            engine.handle_command(&ParticipantId::new(user), &InboundCommand::parse(text));
        assert_eq!(outcome.reply.text, STORAGE_FAILURE_REPLY, "{:?}", text);
        assert_eq!(outcome.reply.visibility, Visibility::Ephemeral);
        assert!(outcome.notice.is_none());
        assert!(outcome.events.is_empty());
    }

    let rows = ledger.inner.read_participants().unwrap();
    assert!(rows.iter().all(|row| row.check_in.is_none()));
    assert_eq!(
        ledger.inner.read_exemptions(&ParticipantId::new("Bob")).unwrap(),
        ""
    );

    // Failures are logged, not recorded as refusals
    assert!(ledger.inner.recent_audits(10).unwrap().is_empty());
}

#[test]
fn test_corrupt_exemption_cell_aborts_the_report() {
    let h = Harness::new((2024, 3, 10), (7, 10));
    h.send("Alice", "");

    let carol = ParticipantId::new("Carol");
    h.ledger.ensure_participant(&carol).unwrap();
    h.ledger.write_exemptions(&carol, "garbage").unwrap();

    let err = h.engine.run_daily_report().unwrap_err();
    assert!(err.is_storage());
    assert!(matches!(
        err,
        hayaoki_core::AttendanceError::Storage(StoreError::Corrupt(_))
    ));

    let audits = h.ledger.recent_audits(10).unwrap();
    assert!(
        !audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::ReportSent { .. }))
    );
}
