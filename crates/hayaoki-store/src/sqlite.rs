//! SQLite-backed ledger

use chrono::{DateTime, NaiveDate};
use hayaoki_util::{ParticipantId, WallClock, format_tracking_day, parse_ledger_date};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, AuditEventType, Ledger, ParticipantRow, StoreError, StoreResult};

/// SQLite-backed ledger.
///
/// Cells keep the text formats of the shared spreadsheet the ledger stands
/// in for: `YYYY/M/D` tracking day, `HH:MM` check-ins, and comma-joined
/// exemption tokens.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create a ledger at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory ledger (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Tracking day (single row)
            CREATE TABLE IF NOT EXISTS tracking (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                day TEXT NOT NULL
            );

            -- Participants in join order
            CREATE TABLE IF NOT EXISTS participants (
                position INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                exemptions TEXT NOT NULL DEFAULT ''
            );

            -- Check-in log, one row per participant and day
            CREATE TABLE IF NOT EXISTS check_ins (
                day TEXT NOT NULL,
                name TEXT NOT NULL,
                time TEXT NOT NULL,
                PRIMARY KEY (day, name)
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Ledger schema initialized");
        Ok(())
    }

    fn tracking_day_cell(conn: &Connection) -> StoreResult<Option<String>> {
        Ok(conn
            .query_row("SELECT day FROM tracking WHERE id = 1", [], |row| row.get(0))
            .optional()?)
    }

    fn participant_exists(conn: &Connection, id: &ParticipantId) -> StoreResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT position FROM participants WHERE name = ?",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl Ledger for SqliteLedger {
    fn read_tracking_day(&self) -> StoreResult<Option<NaiveDate>> {
        let conn = self.conn()?;
        match Self::tracking_day_cell(&conn)? {
            Some(cell) => parse_ledger_date(&cell)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt(format!("tracking day {:?}", cell))),
            None => Ok(None),
        }
    }

    fn advance_tracking_day(&self, today: NaiveDate) -> StoreResult<()> {
        let conn = self.conn()?;
        let cell = format_tracking_day(today);

        if Self::tracking_day_cell(&conn)?.as_deref() == Some(cell.as_str()) {
            return Ok(());
        }

        conn.execute(
            "INSERT OR REPLACE INTO tracking (id, day) VALUES (1, ?)",
            [&cell],
        )?;

        debug!(day = %cell, "Tracking day advanced");
        Ok(())
    }

    fn read_participants(&self) -> StoreResult<Vec<ParticipantRow>> {
        let conn = self.conn()?;
        let day = Self::tracking_day_cell(&conn)?;

        let mut stmt = conn.prepare(
            "SELECT p.name, c.time FROM participants p
             LEFT JOIN check_ins c ON c.name = p.name AND c.day = ?
             ORDER BY p.position",
        )?;

        let rows = stmt.query_map([day], |row| {
            let name: String = row.get(0)?;
            let time: Option<String> = row.get(1)?;
            Ok((name, time))
        })?;

        let mut participants = Vec::new();
        for row in rows {
            let (name, time) = row?;
            let check_in = match time {
                Some(cell) => Some(WallClock::parse(&cell).ok_or_else(|| {
                    StoreError::Corrupt(format!("check-in time {:?} for {}", cell, name))
                })?),
                None => None,
            };
            participants.push(ParticipantRow {
                id: ParticipantId::new(name),
                check_in,
            });
        }

        Ok(participants)
    }

    fn ensure_participant(&self, id: &ParticipantId) -> StoreResult<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO participants (name) VALUES (?)",
            [id.as_str()],
        )?;

        if inserted > 0 {
            debug!(participant = %id, "Participant added");
        }
        Ok(())
    }

    fn record_check_in(&self, id: &ParticipantId, at: WallClock) -> StoreResult<()> {
        let conn = self.conn()?;
        let day = Self::tracking_day_cell(&conn)?
            .ok_or_else(|| StoreError::NotFound("tracking day".into()))?;

        if !Self::participant_exists(&conn, id)? {
            return Err(StoreError::NotFound(format!("participant {}", id)));
        }

        conn.execute(
            "INSERT OR REPLACE INTO check_ins (day, name, time) VALUES (?, ?, ?)",
            params![day, id.as_str(), at.to_string()],
        )?;

        debug!(participant = %id, day = %day, time = %at, "Check-in recorded");
        Ok(())
    }

    fn read_exemptions(&self, id: &ParticipantId) -> StoreResult<String> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT exemptions FROM participants WHERE name = ?",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.unwrap_or_default())
    }

    fn write_exemptions(&self, id: &ParticipantId, raw: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE participants SET exemptions = ? WHERE name = ?",
            params![raw, id.as_str()],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("participant {}", id)));
        }

        debug!(participant = %id, "Exemptions written");
        Ok(())
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp).map_err(|e| {
                StoreError::Corrupt(format!("audit timestamp {:?}: {}", timestamp, e))
            })?;
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Ledger lock poisoned");
                false
            }
        }
    }
}
