//! `month/day[-month/day]` expressions

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone};
use hayaoki_util::{WallClock, parse_digits};

use crate::{AttendanceError, AttendanceResult, DateRange};

/// A parsed date expression. Ordering of a span is not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateExpr {
    Day(NaiveDate),
    Span(NaiveDate, NaiveDate),
}

impl DateExpr {
    /// Parse a single token, inferring the year of each side against `now`.
    ///
    /// A side names the date at `reference` o'clock in the current year; if
    /// that instant is already strictly in the past, the next year is used.
    pub fn parse(
        token: &str,
        now: &DateTime<FixedOffset>,
        reference: WallClock,
    ) -> AttendanceResult<Self> {
        let side = |s: &str| {
            parse_month_day(s)
                .and_then(|(month, day)| infer_year(month, day, now, reference))
                .ok_or_else(|| AttendanceError::parse(token))
        };

        let mut parts = token.split('-');
        let first = parts.next().unwrap_or_default();
        match (parts.next(), parts.next()) {
            (None, _) => Ok(DateExpr::Day(side(first)?)),
            (Some(second), None) => Ok(DateExpr::Span(side(first)?, side(second)?)),
            (Some(_), Some(_)) => Err(AttendanceError::parse(token)),
        }
    }

    /// Validate into an inclusive range
    pub fn into_range(self) -> AttendanceResult<DateRange> {
        match self {
            DateExpr::Day(day) => Ok(DateRange::single(day)),
            DateExpr::Span(start, end) => DateRange::new(start, end),
        }
    }
}

/// Strict `month/day`: ASCII digits, no year, padding optional
pub fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let (month, day) = s.split_once('/')?;
    Some((parse_digits(month, 2)?, parse_digits(day, 2)?))
}

/// Resolve `month/day` to the next occurrence relative to `now`.
///
/// Dates that do not exist in the current year (29 February) fall through
/// to the next year.
pub fn infer_year(
    month: u32,
    day: u32,
    now: &DateTime<FixedOffset>,
    reference: WallClock,
) -> Option<NaiveDate> {
    let year = now.year();

    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
        let at = now
            .timezone()
            .from_local_datetime(&date.and_time(reference.to_naive_time()))
            .single()?;
        if at >= *now {
            return Some(date);
        }
    }

    NaiveDate::from_ymd_opt(year + 1, month, day)
}
