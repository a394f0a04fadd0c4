//! Time utilities for hayaoki
//!
//! Every date computation goes through a [`Clock`] bound to the configured
//! local zone. Nothing here reads or changes a process-wide timezone.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `HAYAOKI_MOCK_TIME` environment variable can be set
//! to shift [`SystemClock`] to a different wall-clock time. The mock time is
//! interpreted in the clock's configured zone and advances at the real rate.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2024-03-10 07:10:00`)
//!
//! Example:
//! ```bash
//! HAYAOKI_MOCK_TIME="2024-03-10 07:10:00" hayaokid
//! ```

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "HAYAOKI_MOCK_TIME";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of "now" in the configured local zone
pub trait Clock: Send + Sync {
    /// Current instant, expressed in the configured zone
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current calendar day in the configured zone
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock reading the system time, shifted into the configured zone
#[derive(Debug, Clone)]
pub struct SystemClock {
    zone: FixedOffset,
    mock_offset: Option<chrono::Duration>,
}

impl SystemClock {
    /// Create a clock for `zone`, honoring `HAYAOKI_MOCK_TIME` in debug builds
    pub fn new(zone: FixedOffset) -> Self {
        let mock_offset = if cfg!(debug_assertions) {
            std::env::var(MOCK_TIME_ENV_VAR)
                .ok()
                .and_then(|value| mock_offset_for(&value, zone, Utc::now()))
        } else {
            None
        };

        Self { zone, mock_offset }
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// Returns whether mock time is active for this clock.
    pub fn is_mock_time_active(&self) -> bool {
        self.mock_offset.is_some()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let real_now = Utc::now().with_timezone(&self.zone);
        match self.mock_offset {
            Some(offset) => real_now + offset,
            None => real_now,
        }
    }
}

/// Offset between a mock local time string and the real instant `real_now`
fn mock_offset_for(
    value: &str,
    zone: FixedOffset,
    real_now: DateTime<Utc>,
) -> Option<chrono::Duration> {
    let naive = match NaiveDateTime::parse_from_str(value, MOCK_TIME_FORMAT) {
        Ok(naive) => naive,
        Err(_) => {
            tracing::warn!(
                mock_time = %value,
                expected_format = MOCK_TIME_FORMAT,
                "Invalid mock time format"
            );
            return None;
        }
    };

    let mock = zone.from_local_datetime(&naive).single()?;
    let offset = mock.signed_duration_since(real_now);
    tracing::info!(
        mock_time = %value,
        offset_secs = offset.num_seconds(),
        "Mock time enabled"
    );
    Some(offset)
}

/// Clock pinned to a settable instant, for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Build a clock at the given local date and time in `zone`.
    /// Returns `None` for an impossible date or time.
    pub fn at(
        zone: FixedOffset,
        date: (i32, u32, u32),
        time: (u32, u32),
    ) -> Option<Self> {
        let naive = NaiveDate::from_ymd_opt(date.0, date.1, date.2)?
            .and_hms_opt(time.0, time.1, 0)?;
        let now = zone.from_local_datetime(&naive).single()?;
        Some(Self::new(now))
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse a `+HH:MM` / `-HH:MM` UTC offset
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Time of day with minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `H:MM` or `HH:MM`
    pub fn parse(s: &str) -> Option<Self> {
        let (hour, minute) = s.split_once(':')?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return None;
        }
        if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::new(hour.parse().ok()?, minute.parse().ok()?)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or_default()
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    /// Minute-precision time of day of a zoned instant
    pub fn of<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self::from_naive_time(dt.time())
    }

    /// Returns minutes since midnight
    pub fn as_minutes_from_midnight(&self) -> u32 {
        (self.hour as u32) * 60 + self.minute as u32
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_minutes_from_midnight()
            .cmp(&other.as_minutes_from_midnight())
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Half-open daily window `[start, end)` within a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start: WallClock,
    pub end: WallClock,
}

impl DailyWindow {
    pub fn new(start: WallClock, end: WallClock) -> Self {
        Self { start, end }
    }

    /// Check if the given local datetime falls within this window.
    /// Seconds count: 08:34:59 is inside a window ending at 08:35.
    pub fn contains<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        let time = dt.time();
        time >= self.start.to_naive_time() && time < self.end.to_naive_time()
    }
}

impl fmt::Display for DailyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:02} and {}:{:02}",
            self.start.hour, self.start.minute, self.end.hour, self.end.minute
        )
    }
}
