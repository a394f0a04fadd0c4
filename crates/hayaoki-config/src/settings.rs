//! Validated settings structures

use chrono::{FixedOffset, Offset, Utc};
use hayaoki_util::{
    DailyWindow, WallClock, data_dir_without_env, parse_utc_offset, socket_path_without_env,
};
use std::path::PathBuf;
use std::time::Duration;

use crate::schema::{RawAttendance, RawConfig, RawReport, RawServiceConfig};
use crate::validation::parse_time;

pub const DEFAULT_WINDOW_START: WallClock = WallClock { hour: 6, minute: 0 };
pub const DEFAULT_CUTOFF: WallClock = WallClock { hour: 8, minute: 35 };
pub const DEFAULT_YEAR_ROLL_TIME: WallClock = WallClock { hour: 7, minute: 30 };
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 9 * 3600;
pub const DEFAULT_CHANNEL: &str = "hayaoki";
pub const DEFAULT_NAME_SUFFIX: &str = "さん";
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Validated settings ready for use by the engine and the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub attendance: AttendancePolicy,
    pub report: ReportPolicy,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            attendance: AttendancePolicy::from_raw(raw.attendance),
            report: ReportPolicy::from_raw(raw.report),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    /// Deadline for a single ledger-bound request
    pub storage_timeout: Duration,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(socket_path_without_env),
            data_dir: raw.data_dir.unwrap_or_else(data_dir_without_env),
            storage_timeout: raw
                .storage_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STORAGE_TIMEOUT),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// When and where check-ins count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendancePolicy {
    /// The single local zone every date is computed in
    pub zone: FixedOffset,
    /// `[window_start, cutoff)`
    pub check_in_window: DailyWindow,
    /// Reference time of day used when inferring the year of `month/day`
    pub year_roll_time: WallClock,
}

impl AttendancePolicy {
    fn from_raw(raw: RawAttendance) -> Self {
        let time_or = |value: Option<String>, default: WallClock| {
            value
                .and_then(|v| parse_time(&v).ok())
                .unwrap_or(default)
        };

        Self {
            zone: raw
                .utc_offset
                .and_then(|v| parse_utc_offset(&v))
                .unwrap_or_else(default_zone),
            check_in_window: DailyWindow::new(
                time_or(raw.window_start, DEFAULT_WINDOW_START),
                time_or(raw.cutoff, DEFAULT_CUTOFF),
            ),
            year_roll_time: time_or(raw.year_roll_time, DEFAULT_YEAR_ROLL_TIME),
        }
    }
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            zone: default_zone(),
            check_in_window: DailyWindow::new(DEFAULT_WINDOW_START, DEFAULT_CUTOFF),
            year_roll_time: DEFAULT_YEAR_ROLL_TIME,
        }
    }
}

fn default_zone() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// How the daily report is rendered and delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPolicy {
    pub channel: String,
    pub name_suffix: String,
    /// `None` leaves triggering to an external scheduler
    pub schedule: Option<WallClock>,
}

impl ReportPolicy {
    fn from_raw(raw: RawReport) -> Self {
        Self {
            channel: raw.channel.unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            name_suffix: raw
                .name_suffix
                .unwrap_or_else(|| DEFAULT_NAME_SUFFIX.to_string()),
            schedule: raw.schedule.and_then(|v| parse_time(&v).ok()),
        }
    }
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self::from_raw(RawReport::default())
    }
}
