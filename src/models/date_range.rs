//! Inclusive date ranges
//!
//! Budget math is month-oriented, so the range helpers are built around
//! calendar months plus a trailing-window helper for register views.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive `[start, end]` date range with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range; fails if `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::StartAfterEnd { start, end });
        }
        Ok(Self { start, end })
    }

    /// The full calendar month `[Y-M-01, last day of M]`
    pub fn for_month(year: i32, month: u32) -> Result<Self, DateRangeError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(DateRangeError::InvalidMonth { year, month })?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(DateRangeError::InvalidMonth { year, month })?;
        Ok(Self {
            start,
            end: next_month - Duration::days(1),
        })
    }

    /// The `n`-day window ending at `end` (inclusive on both sides)
    pub fn last_n_days(end: NaiveDate, n: u32) -> Self {
        let days = i64::from(n.max(1)) - 1;
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Check whether a date falls inside the range
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Errors for range construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
    InvalidMonth { year: i32, month: u32 },
}

impl fmt::Display for DateRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartAfterEnd { start, end } => {
                write!(f, "range start {} is after end {}", start, end)
            }
            Self::InvalidMonth { year, month } => {
                write!(f, "invalid month: {}-{}", year, month)
            }
        }
    }
}

impl std::error::Error for DateRangeError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_ordering_enforced() {
        assert!(DateRange::new(d(2026, 2, 10), d(2026, 2, 1)).is_err());
        assert!(DateRange::new(d(2026, 2, 1), d(2026, 2, 1)).is_ok());
    }

    #[test]
    fn test_for_month() {
        let feb = DateRange::for_month(2026, 2).unwrap();
        assert_eq!(feb.start(), d(2026, 2, 1));
        assert_eq!(feb.end(), d(2026, 2, 28));

        let feb_leap = DateRange::for_month(2024, 2).unwrap();
        assert_eq!(feb_leap.end(), d(2024, 2, 29));

        let dec = DateRange::for_month(2026, 12).unwrap();
        assert_eq!(dec.end(), d(2026, 12, 31));

        assert!(DateRange::for_month(2026, 13).is_err());
        assert!(DateRange::for_month(2026, 0).is_err());
    }

    #[test]
    fn test_last_n_days() {
        let window = DateRange::last_n_days(d(2026, 2, 10), 7);
        assert_eq!(window.start(), d(2026, 2, 4));
        assert_eq!(window.end(), d(2026, 2, 10));

        // A zero-day request still yields a one-day window
        let single = DateRange::last_n_days(d(2026, 2, 10), 0);
        assert_eq!(single.start(), single.end());
    }

    #[test]
    fn test_contains() {
        let feb = DateRange::for_month(2026, 2).unwrap();
        assert!(feb.contains(d(2026, 2, 1)));
        assert!(feb.contains(d(2026, 2, 28)));
        assert!(!feb.contains(d(2026, 3, 1)));
        assert!(!feb.contains(d(2026, 1, 31)));
    }
}
