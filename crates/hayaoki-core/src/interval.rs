//! Exemption windows and the closed-interval overlap rule

use chrono::NaiveDate;
use hayaoki_store::{StoreError, StoreResult};
use hayaoki_util::{format_ledger_date, format_notice_date, parse_ledger_date};
use std::fmt;

use crate::{AttendanceError, AttendanceResult};

/// Inclusive date range with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range, refusing `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> AttendanceResult<Self> {
        if start > end {
            return Err(AttendanceError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Closed on both sides: ranges sharing an endpoint overlap
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Parse one ledger token: `YYYY/MM/DD` or `YYYY/MM/DD-YYYY/MM/DD`
    pub fn parse_token(token: &str) -> Option<Self> {
        match token.split_once('-') {
            None => parse_ledger_date(token).map(Self::single),
            Some((start, end)) => {
                let start = parse_ledger_date(start)?;
                let end = parse_ledger_date(end)?;
                (start <= end).then_some(Self { start, end })
            }
        }
    }

    /// Window description used in broadcast notices
    pub fn notice_phrase(&self) -> String {
        if self.is_single() {
            format!("{}に", format_notice_date(self.start))
        } else {
            format!(
                "{}から{}の間",
                format_notice_date(self.start),
                format_notice_date(self.end)
            )
        }
    }
}

/// Ledger form, as stored and acknowledged
impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", format_ledger_date(self.start))
        } else {
            write!(
                f,
                "{}-{}",
                format_ledger_date(self.start),
                format_ledger_date(self.end)
            )
        }
    }
}

/// One participant's exemption windows.
///
/// Kept in insertion order and never merged; every query is order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    ranges: Vec<DateRange>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw ledger cell. Empty tokens are skipped; anything else
    /// that does not parse is a malformed cell.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let ranges = raw
            .split(',')
            .filter(|token| !token.is_empty())
            .map(|token| {
                DateRange::parse_token(token)
                    .ok_or_else(|| StoreError::Corrupt(format!("exemption token {:?}", token)))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Self { ranges })
    }

    pub fn overlaps(&self, candidate: &DateRange) -> bool {
        self.ranges.iter().any(|stored| stored.overlaps(candidate))
    }

    /// Store `candidate` unless it touches an existing window
    pub fn append(&mut self, candidate: DateRange) -> AttendanceResult<()> {
        if self.overlaps(&candidate) {
            return Err(AttendanceError::Overlap);
        }
        self.ranges.push(candidate);
        Ok(())
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.ranges.iter().any(|range| range.contains(day))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Comma-joined ledger form
    pub fn to_ledger_string(&self) -> String {
        self.ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
