//! Text formats shared with the ledger
//!
//! The tracking-day cell holds `YYYY/M/D`, exemption tokens hold
//! `YYYY/MM/DD`. Both are read back leniently: any `year/month/day` with
//! ASCII digits parses.

use chrono::{Datelike, NaiveDate};

/// Format a tracking-day cell: `2024/3/10`
pub fn format_tracking_day(day: NaiveDate) -> String {
    format!("{}/{}/{}", day.year(), day.month(), day.day())
}

/// Format a date as used in exemption cells and acknowledgements: `2024/03/10`
pub fn format_ledger_date(day: NaiveDate) -> String {
    day.format("%Y/%m/%d").to_string()
}

/// Format a date for broadcast notices: `03月10日`
pub fn format_notice_date(day: NaiveDate) -> String {
    day.format("%m月%d日").to_string()
}

/// Parse a `year/month/day` cell value
pub fn parse_ledger_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('/');
    let year = parse_digits(parts.next()?, 4)?;
    let month = parse_digits(parts.next()?, 2)?;
    let day = parse_digits(parts.next()?, 2)?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// Parse a non-empty run of at most `max_len` ASCII digits
pub fn parse_digits(s: &str, max_len: usize) -> Option<u32> {
    if s.is_empty() || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
