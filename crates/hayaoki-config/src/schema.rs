//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Check-in window and local zone
    #[serde(default)]
    pub attendance: RawAttendance,

    /// Daily report settings
    #[serde(default)]
    pub report: RawReport,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/hayaoki/hayaokid.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the ledger
    pub data_dir: Option<PathBuf>,

    /// Deadline for a single ledger-bound request, in milliseconds
    pub storage_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAttendance {
    /// Local zone as `+HH:MM`
    pub utc_offset: Option<String>,

    /// First minute a check-in is accepted (HH:MM)
    pub window_start: Option<String>,

    /// First minute a check-in is refused again (HH:MM)
    pub cutoff: Option<String>,

    /// Time of day a bare `month/day` is anchored to when inferring its year
    pub year_roll_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawReport {
    /// Broadcast destination for notices and the report
    pub channel: Option<String>,

    /// Appended to every name in broadcast text
    pub name_suffix: Option<String>,

    /// Local time (HH:MM) at which the service sends the report itself
    pub schedule: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.attendance.cutoff.is_none());
        assert!(config.report.channel.is_none());
    }

    #[test]
    fn parse_attendance_section() {
        let toml_str = r#"
            config_version = 1

            [attendance]
            window_start = "06:00"
            cutoff = "08:05"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.attendance.cutoff.as_deref(), Some("08:05"));
        assert!(config.attendance.utc_offset.is_none());
    }
}
