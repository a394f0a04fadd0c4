//! Configuration validation

use crate::schema::RawConfig;
use hayaoki_util::{WallClock, parse_utc_offset};
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid time format for '{field}' ('{value}'): {message}")]
    InvalidTimeFormat {
        field: &'static str,
        value: String,
        message: String,
    },

    #[error("Invalid UTC offset '{0}': expected +HH:MM or -HH:MM")]
    InvalidUtcOffset(String),

    #[error("Check-in window is empty: window_start {start} is not before cutoff {cutoff}")]
    EmptyWindow { start: String, cutoff: String },

    #[error("Report channel cannot be empty")]
    EmptyChannel,

    #[error("storage_timeout_ms must be greater than zero")]
    ZeroTimeout,
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.service.storage_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout);
    }

    let attendance = &config.attendance;
    if let Some(offset) = &attendance.utc_offset
        && parse_utc_offset(offset).is_none()
    {
        errors.push(ValidationError::InvalidUtcOffset(offset.clone()));
    }

    let start = check_time(&mut errors, "window_start", attendance.window_start.as_deref());
    let cutoff = check_time(&mut errors, "cutoff", attendance.cutoff.as_deref());
    check_time(&mut errors, "year_roll_time", attendance.year_roll_time.as_deref());

    // Only compare when both ends parsed; otherwise the format error already covers it
    if let (Some(start), Some(cutoff)) = (start, cutoff) {
        let start = start.unwrap_or(crate::DEFAULT_WINDOW_START);
        let cutoff = cutoff.unwrap_or(crate::DEFAULT_CUTOFF);
        if start >= cutoff {
            errors.push(ValidationError::EmptyWindow {
                start: start.to_string(),
                cutoff: cutoff.to_string(),
            });
        }
    }

    let report = &config.report;
    if let Some(channel) = &report.channel
        && channel.trim().is_empty()
    {
        errors.push(ValidationError::EmptyChannel);
    }
    check_time(&mut errors, "schedule", report.schedule.as_deref());

    errors
}

/// `None` when the value is present but malformed, `Some(None)` when absent
fn check_time(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: Option<&str>,
) -> Option<Option<WallClock>> {
    let Some(value) = value else {
        return Some(None);
    };

    match parse_time(value) {
        Ok(time) => Some(Some(time)),
        Err(message) => {
            errors.push(ValidationError::InvalidTimeFormat {
                field,
                value: value.to_string(),
                message,
            });
            None
        }
    }
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<WallClock, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected HH:MM format".into());
    }

    let hour: u8 = parts[0]
        .parse()
        .map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = parts[1]
        .parse()
        .map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    WallClock::new(hour, minute).ok_or_else(|| "Invalid time of day".to_string())
}
