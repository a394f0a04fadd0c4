//! hayaokid - The hayaoki attendance service
//!
//! This is the main entry point for the hayaokid service.
//! It wires together all the components:
//! - Configuration loading
//! - Ledger initialization
//! - Attendance engine
//! - IPC server (chat bridge and admin clients)
//! - Optional in-process daily report schedule

mod scheduler;

use anyhow::{Context, Result};
use clap::Parser;
use hayaoki_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, InboundCommand, Reply,
    Response, ResponsePayload, ServiceStatus,
};
use hayaoki_config::{Settings, load_config};
use hayaoki_core::{
    AttendanceEngine, CommandOutcome, CoreEvent, Deadline, ReportOutcome, STORAGE_FAILURE_REPLY,
};
use hayaoki_ipc::{IpcServer, ServerMessage};
use hayaoki_store::{AuditEventType, Ledger, SqliteLedger};
use hayaoki_util::{
    ClientId, ParticipantId, RateLimiter, SystemClock, default_config_path, format_tracking_day,
    ledger_db_path,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use scheduler::ReportSchedule;

/// hayaokid - Early check-in attendance service
#[derive(Parser, Debug)]
#[command(name = "hayaokid")]
#[command(about = "Early check-in attendance and kiken exemption service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/hayaoki/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set HAYAOKI_SOCKET env var)
    #[arg(short, long, env = "HAYAOKI_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set HAYAOKI_DATA_DIR env var)
    #[arg(short, long, env = "HAYAOKI_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Why a blocking ledger call produced no value
#[derive(Debug)]
enum BlockingFailure {
    TimedOut,
    Panicked(String),
}

impl std::fmt::Display for BlockingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockingFailure::TimedOut => write!(f, "ledger deadline exceeded"),
            BlockingFailure::Panicked(msg) => write!(f, "ledger task failed: {}", msg),
        }
    }
}

/// State shared by the request tasks
struct Shared {
    engine: Arc<AttendanceEngine>,
    ipc: Arc<IpcServer>,
    rate_limiter: Mutex<RateLimiter<ClientId>>,
    schedule: Mutex<Option<ReportSchedule>>,
    storage_timeout: Duration,
}

impl Shared {
    /// Run read-only `f` on a blocking worker under the storage deadline.
    ///
    /// A call that misses the deadline keeps running in the background; its
    /// result is dropped. Commands that write go through `run_slash_command`.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, BlockingFailure>
    where
        T: Send + 'static,
        F: FnOnce(&AttendanceEngine) -> T + Send + 'static,
    {
        let engine = self.engine.clone();
        let task = tokio::task::spawn_blocking(move || f(&engine));

        match tokio::time::timeout(self.storage_timeout, task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BlockingFailure::Panicked(e.to_string())),
            Err(_) => Err(BlockingFailure::TimedOut),
        }
    }

    fn emit(&self, payload: EventPayload) {
        self.ipc
            .broadcast_event(Event::new(self.engine.clock().now(), payload));
    }

    fn broadcast_notice(&self, text: String) {
        let channel = self.engine.report_policy().channel.clone();
        self.emit(EventPayload::notice(channel, text));
    }

    fn forward_core_events(&self, events: Vec<CoreEvent>) {
        for event in events {
            match event {
                CoreEvent::TrackingDayAdvanced { day } => {
                    self.emit(EventPayload::TrackingDayAdvanced {
                        day: format_tracking_day(day),
                    });
                }
                CoreEvent::ReportReady { report, text } => {
                    self.emit(EventPayload::ReportSent {
                        channel: self.engine.report_policy().channel.clone(),
                        day: format_tracking_day(report.day),
                        text,
                        succeeded: report.succeeded,
                        exempted: report.exempted,
                        failed: report.failed,
                    });
                }
                CoreEvent::CheckedIn { .. } | CoreEvent::ExemptionAdded { .. } => {
                    debug!(event = ?event, "Core event");
                }
            }
        }
    }

    /// Broadcast what a finished command produced and hand back its reply
    fn publish(&self, outcome: CommandOutcome) -> Reply {
        if let Some(notice) = outcome.notice {
            self.broadcast_notice(notice);
        }
        self.forward_core_events(outcome.events);
        outcome.reply
    }

    /// Run the aggregation and broadcast the result. Nothing is sent on failure.
    async fn send_daily_report(&self) -> Result<ReportOutcome, ErrorInfo> {
        match self.run_blocking(|engine| engine.run_daily_report()).await {
            Ok(Ok(outcome)) => {
                self.forward_core_events(vec![CoreEvent::ReportReady {
                    report: outcome.report.clone(),
                    text: outcome.text.clone(),
                }]);
                Ok(outcome)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Daily report aborted");
                Err(ErrorInfo::new(ErrorCode::StorageError, e.to_string()))
            }
            Err(e) => {
                error!(error = %e, "Daily report aborted");
                let code = match e {
                    BlockingFailure::TimedOut => ErrorCode::Timeout,
                    BlockingFailure::Panicked(_) => ErrorCode::InternalError,
                };
                Err(ErrorInfo::new(code, e.to_string()))
            }
        }
    }
}

/// Main service state
struct Service {
    shared: Arc<Shared>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let settings = if args.config.exists() {
            let settings = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(config_path = %args.config.display(), "Configuration loaded");
            settings
        } else {
            warn!(
                config_path = %args.config.display(),
                "Configuration file not found, using defaults"
            );
            Settings::default()
        };

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| settings.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = ledger_db_path(&data_dir);
        let ledger: Arc<dyn Ledger> = Arc::new(
            SqliteLedger::open(&db_path)
                .with_context(|| format!("Failed to open ledger {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Ledger initialized");

        let clock = SystemClock::new(settings.attendance.zone);
        if clock.is_mock_time_active() {
            warn!("Mock time is active; dates and windows follow HAYAOKI_MOCK_TIME");
        }

        let engine = Arc::new(AttendanceEngine::new(
            settings.attendance,
            settings.report.clone(),
            ledger,
            Arc::new(clock),
        ));

        engine.audit(AuditEventType::ServiceStarted);

        let now = engine.clock().now();
        let schedule = settings.report.schedule.map(|at| {
            info!(at = %at, "Daily report scheduled");
            ReportSchedule::new(at, &now)
        });

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        // Rate limiter: 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            shared: Arc::new(Shared {
                engine,
                ipc: Arc::new(ipc),
                rate_limiter: Mutex::new(rate_limiter),
                schedule: Mutex::new(schedule),
                storage_timeout: settings.service.storage_timeout,
            }),
        })
    }

    async fn run(self) -> Result<()> {
        let shared = self.shared;
        let mut ipc_messages = shared
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = shared.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut tick_timer = tokio::time::interval(Duration::from_secs(15));

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                // Scheduled report and housekeeping
                _ = tick_timer.tick() => {
                    let now = shared.engine.clock().now();
                    let due = {
                        let mut schedule = shared.schedule.lock().await;
                        schedule.as_mut().is_some_and(|s| s.due(&now))
                    };

                    if due {
                        info!(day = %now.date_naive(), "Scheduled daily report");
                        let shared = shared.clone();
                        tokio::spawn(async move {
                            let _ = shared.send_daily_report().await;
                        });
                    }

                    shared.rate_limiter.lock().await.cleanup(Duration::from_secs(300));
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&shared, msg).await;
                }
            }
        }

        info!("Shutting down hayaokid");

        shared.emit(EventPayload::Shutdown);
        shared.engine.audit(AuditEventType::ServiceStopped);
        shared.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(shared: &Arc<Shared>, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = shared.rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = shared.ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                // Each request is independent; ledger writes serialize in the engine
                let shared = shared.clone();
                tokio::spawn(async move {
                    let response = Self::handle_command(
                        &shared,
                        &client_id,
                        request.request_id,
                        request.command,
                    )
                    .await;
                    let _ = shared.ipc.send_response(&client_id, response).await;
                });
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
                shared.rate_limiter.lock().await.remove(&client_id);
            }
        }
    }

    async fn handle_command(
        shared: &Arc<Shared>,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        let role = shared
            .ipc
            .get_client_info(client_id)
            .await
            .map(|info| info.role)
            .unwrap_or(ClientRole::Observer);

        match command {
            Command::SlashCommand { user, text } => {
                if !role.can_submit_commands() {
                    return permission_denied(request_id, role);
                }
                if user.is_empty() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::InvalidRequest, "Missing user name"),
                    );
                }

                let reply = Self::run_slash_command(shared, user, text).await;
                Response::success(request_id, ResponsePayload::Reply(reply))
            }

            Command::RunDailyReport => {
                if !role.can_trigger_report() {
                    return permission_denied(request_id, role);
                }

                match shared.send_daily_report().await {
                    Ok(outcome) => Response::success(
                        request_id,
                        ResponsePayload::ReportSent {
                            day: format_tracking_day(outcome.report.day),
                            text: outcome.text,
                        },
                    ),
                    Err(e) => Response::error(request_id, e),
                }
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::UnsubscribeEvents => {
                Response::success(request_id, ResponsePayload::Unsubscribed)
            }

            Command::GetStatus => {
                let (store_ok, tracking_day) = match shared
                    .run_blocking(|engine| (engine.ledger_healthy(), engine.tracking_day()))
                    .await
                {
                    Ok((healthy, Ok(day))) => (healthy, day),
                    Ok((_, Err(e))) => {
                        warn!(error = %e, "Failed to read tracking day");
                        (false, None)
                    }
                    Err(e) => {
                        warn!(error = %e, "Status check failed");
                        (false, None)
                    }
                };

                let (report_schedule, last_report_day) = {
                    let schedule = shared.schedule.lock().await;
                    match schedule.as_ref() {
                        Some(s) => (Some(s.at().to_string()), s.last_fired()),
                        None => (None, None),
                    }
                };

                Response::success(
                    request_id,
                    ResponsePayload::Status(ServiceStatus {
                        live: true,
                        store_ok,
                        tracking_day: tracking_day.map(format_tracking_day),
                        report_schedule,
                        last_report_day: last_report_day.map(format_tracking_day),
                    }),
                )
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }

    /// Dispatch one `/hayaoki` invocation and fan out its notice.
    ///
    /// The engine starts no ledger write past the storage deadline. A write
    /// already underway when the deadline passes still lands, so the task is
    /// awaited to completion and whatever it committed is still broadcast.
    async fn run_slash_command(shared: &Arc<Shared>, user: ParticipantId, text: String) -> Reply {
        let command = InboundCommand::parse(&text);
        let requester = user.clone();
        let engine = shared.engine.clone();
        let deadline = Deadline::after(shared.storage_timeout);

        let mut task = tokio::task::spawn_blocking(move || {
            engine.handle_command_within(&requester, &command, deadline)
        });

        match tokio::time::timeout(shared.storage_timeout, &mut task).await {
            Ok(Ok(outcome)) => shared.publish(outcome),
            Ok(Err(e)) => {
                error!(user = %user, text = %text, error = %e, "Command task failed");
                Reply::private(STORAGE_FAILURE_REPLY)
            }
            Err(_) => {
                error!(user = %user, text = %text, "Command missed the storage deadline");

                let late = shared.clone();
                tokio::spawn(async move {
                    match task.await {
                        Ok(outcome) => {
                            if outcome.notice.is_some() {
                                warn!(user = %user, "Late command committed; broadcasting notice");
                            }
                            late.publish(outcome);
                        }
                        Err(e) => error!(user = %user, error = %e, "Command task failed"),
                    }
                });

                Reply::private(STORAGE_FAILURE_REPLY)
            }
        }
    }
}

fn permission_denied(request_id: u64, role: ClientRole) -> Response {
    Response::error(
        request_id,
        ErrorInfo::new(
            ErrorCode::PermissionDenied,
            format!("Not allowed for role {:?}", role),
        ),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hayaokid starting");

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hayaoki_config::{AttendancePolicy, ReportPolicy};
    use hayaoki_ipc::IpcClient;
    use hayaoki_store::{AuditEvent, ParticipantRow, StoreResult};
    use hayaoki_util::{FixedClock, WallClock};
    use std::thread;
    use tempfile::tempdir;

    /// Ledger that stalls on the tracking-day read or on the check-in write
    struct DelayedLedger {
        inner: SqliteLedger,
        read_delay: Duration,
        write_delay: Duration,
    }

    impl DelayedLedger {
        fn new(read_delay: Duration, write_delay: Duration) -> Self {
            Self {
                inner: SqliteLedger::in_memory().unwrap(),
                read_delay,
                write_delay,
            }
        }
    }

    impl Ledger for DelayedLedger {
        fn read_tracking_day(&self) -> StoreResult<Option<NaiveDate>> {
            thread::sleep(self.read_delay);
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

        fn record_check_in(&self, id: &ParticipantId, at: WallClock) -> StoreResult<()> {
            thread::sleep(self.write_delay);
            self.inner.record_check_in(id, at)
        }

        fn read_exemptions(&self, id: &ParticipantId) -> StoreResult<String> {
            self.inner.read_exemptions(id)
        }

        fn write_exemptions(&self, id: &ParticipantId, raw: &str) -> StoreResult<()> {
            self.inner.write_exemptions(id, raw)
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

    const STORAGE_TIMEOUT: Duration = Duration::from_millis(100);
    const STALL: Duration = Duration::from_millis(400);

    fn make_shared(ledger: Arc<DelayedLedger>, ipc: IpcServer) -> Shared {
        let attendance = AttendancePolicy::default();
        let clock = FixedClock::at(attendance.zone, (2024, 3, 10), (7, 10)).unwrap();
        let engine = AttendanceEngine::new(
            attendance,
            ReportPolicy::default(),
            ledger,
            Arc::new(clock),
        );

        Shared {
            engine: Arc::new(engine),
            ipc: Arc::new(ipc),
            rate_limiter: Mutex::new(RateLimiter::new(30, Duration::from_secs(1))),
            schedule: Mutex::new(None),
            storage_timeout: STORAGE_TIMEOUT,
        }
    }

    #[tokio::test]
    async fn test_stalled_read_fails_without_writing() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(DelayedLedger::new(STALL, Duration::ZERO));
        let ipc = IpcServer::new(dir.path().join("hayaokid.sock"));
        let shared = Arc::new(make_shared(ledger.clone(), ipc));

        let reply =
            Service::run_slash_command(&shared, ParticipantId::new("Alice"), String::new()).await;
        assert_eq!(reply, Reply::private(STORAGE_FAILURE_REPLY));

        // Let the abandoned task run to the end
        tokio::time::sleep(STALL * 2).await;

        assert!(ledger.inner.read_tracking_day().unwrap().is_none());
        assert!(ledger.inner.read_participants().unwrap().is_empty());
        assert!(ledger.inner.recent_audits(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_in_flight_at_deadline_is_still_broadcast() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("hayaokid.sock");
        let ledger = Arc::new(DelayedLedger::new(Duration::ZERO, STALL));

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await.unwrap();
        let mut messages = ipc.take_message_receiver().await.unwrap();
        let shared = Arc::new(make_shared(ledger.clone(), ipc));

        let accept = shared.ipc.clone();
        tokio::spawn(async move {
            let _ = accept.run().await;
        });
        let serving = shared.clone();
        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                Service::handle_ipc_message(&serving, msg).await;
            }
        });

        let watcher = IpcClient::connect(&socket_path).await.unwrap();
        let mut events = watcher.subscribe().await.unwrap();

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let payload = client
            .request(Command::SlashCommand {
                user: ParticipantId::new("Alice"),
                text: String::new(),
            })
            .await
            .unwrap();
        match payload {
            ResponsePayload::Reply(reply) => assert_eq!(reply.text, STORAGE_FAILURE_REPLY),
            other => panic!("unexpected payload: {:?}", other),
        }

        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap();
        match event.payload {
            EventPayload::Notice { channel, text, .. } => {
                assert_eq!(channel, "hayaoki");
                assert_eq!(text, "Aliceさんが早起きに成功しました。");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let rows = ledger.inner.read_participants().unwrap();
        assert_eq!(rows[0].check_in, WallClock::new(7, 10));
        let audits = ledger.inner.recent_audits(1).unwrap();
        assert!(matches!(
            audits[0].event,
            AuditEventType::CheckInRecorded { .. }
        ));
    }
}
