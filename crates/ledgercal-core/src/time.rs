//! Date types for calendar reconciliation.
//!
//! This module provides [`EventTime`] for representing the start of a remote
//! event (which may be either a specific datetime or an all-day date), and
//! [`DateWindow`] for defining the day range a sync pass covers.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Represents the start of a calendar event as reported by a provider.
///
/// - **DateTime**: A specific point in time, with the offset it was reported in
/// - **AllDay**: A date without a specific time (all-day events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime. The offset decides which day it falls on.
    DateTime(DateTime<FixedOffset>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a datetime in any timezone,
    /// keeping its offset.
    pub fn from_local<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the calendar day of this event time.
    ///
    /// Datetimes contribute the date portion in their own offset; this is the
    /// granularity used when matching remote events against local ones.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }

    fn sort_key(&self) -> (NaiveDate, Option<DateTime<Utc>>) {
        match self {
            Self::DateTime(dt) => (dt.date_naive(), Some(dt.with_timezone(&Utc))),
            Self::AllDay(date) => (*date, None),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Errors building a [`DateWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("window offset of {0} days is out of range")]
    OutOfRange(i64),
}

/// A day range a sync pass covers.
///
/// Represents a half-open interval `[start, end)` of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day of the window (inclusive).
    pub start: NaiveDate,
    /// Day after the last day of the window (exclusive).
    pub end: NaiveDate,
}

impl DateWindow {
    /// Creates a new window, rejecting inverted bounds.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a window reaching `past_days` before and `future_days` after `today`.
    ///
    /// The end is exclusive, so `today` itself is always covered.
    pub fn around(today: NaiveDate, past_days: u32, future_days: u32) -> Result<Self, WindowError> {
        let start = today
            .checked_sub_signed(Duration::days(i64::from(past_days)))
            .ok_or(WindowError::OutOfRange(-i64::from(past_days)))?;
        let end = today
            .checked_add_signed(Duration::days(i64::from(future_days) + 1))
            .ok_or(WindowError::OutOfRange(i64::from(future_days)))?;
        Self::new(start, end)
    }

    /// Creates a window covering one calendar year.
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(Self { start, end })
    }

    /// Checks if a day falls within this window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Checks if an event time falls within this window (by its day).
    pub fn contains_event_time(&self, et: &EventTime) -> bool {
        self.contains(et.date())
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Number of days covered.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Years touched by the window, in ascending order.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        let first = self.start.year();
        let last = if self.is_empty() {
            first - 1
        } else {
            self.end.pred_opt().map_or(first, |d| d.year())
        };
        first..=last
    }

    /// UTC instants bounding the window, for providers that query by time.
    pub fn to_utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start.and_time(chrono::NaiveTime::MIN).and_utc(),
            self.end.and_time(chrono::NaiveTime::MIN).and_utc(),
        )
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod event_time {
        use super::*;

        #[test]
        fn date_extraction() {
            let et = EventTime::from_local(utc(2025, 2, 5, 23, 59));
            assert_eq!(et.date(), date(2025, 2, 5));
            assert!(!et.is_all_day());

            let et = EventTime::from_date(date(2025, 3, 15));
            assert_eq!(et.date(), date(2025, 3, 15));
            assert!(et.is_all_day());
        }

        #[test]
        fn from_local_keeps_local_day() {
            let offset = FixedOffset::east_opt(2 * 3600).unwrap();
            let local = offset.with_ymd_and_hms(2025, 3, 1, 0, 30, 0).unwrap();
            let et = EventTime::from_local(local);
            assert_eq!(et.date(), date(2025, 3, 1));

            let offset = FixedOffset::west_opt(5 * 3600).unwrap();
            let evening = offset.with_ymd_and_hms(2025, 2, 28, 22, 0, 0).unwrap();
            assert_eq!(EventTime::from_local(evening).date(), date(2025, 2, 28));
        }

        #[test]
        fn same_instant_in_other_offset_is_equal() {
            let offset = FixedOffset::east_opt(3600).unwrap();
            let local = offset.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap();
            assert_eq!(
                EventTime::from_local(local),
                EventTime::from_local(utc(2025, 3, 15, 9, 0))
            );
        }

        #[test]
        fn ordering_puts_all_day_first() {
            let all_day = EventTime::from_date(date(2025, 2, 5));
            let morning = EventTime::from_local(utc(2025, 2, 5, 9, 0));
            let earlier_day = EventTime::from_local(utc(2025, 2, 4, 23, 0));
            assert!(earlier_day < all_day);
            assert!(all_day < morning);
        }

        #[test]
        fn serde_shape() {
            let et = EventTime::from_date(date(2025, 2, 5));
            let json = serde_json::to_string(&et).unwrap();
            assert_eq!(json, r#"{"type":"AllDay","value":"2025-02-05"}"#);
        }
    }

    mod date_window {
        use super::*;

        #[test]
        fn half_open_contains() {
            let window = DateWindow::new(date(2025, 1, 1), date(2026, 1, 1)).unwrap();
            assert!(window.contains(date(2025, 1, 1)));
            assert!(window.contains(date(2025, 12, 31)));
            assert!(!window.contains(date(2026, 1, 1)));
            assert!(!window.contains(date(2024, 12, 31)));
            assert_eq!(window.num_days(), 365);
        }

        #[test]
        fn inverted_is_rejected() {
            let err = DateWindow::new(date(2025, 2, 1), date(2025, 1, 1)).unwrap_err();
            assert!(matches!(err, WindowError::Inverted { .. }));
        }

        #[test]
        fn around_covers_today() {
            let window = DateWindow::around(date(2025, 6, 15), 30, 90).unwrap();
            assert_eq!(window.start, date(2025, 5, 16));
            assert_eq!(window.end, date(2025, 9, 14));
            assert!(window.contains(date(2025, 6, 15)));

            let today_only = DateWindow::around(date(2025, 6, 15), 0, 0).unwrap();
            assert_eq!(today_only.num_days(), 1);
        }

        #[test]
        fn years_touched() {
            let window = DateWindow::new(date(2024, 11, 1), date(2026, 1, 1)).unwrap();
            assert_eq!(window.years().collect::<Vec<_>>(), vec![2024, 2025]);

            let window = DateWindow::new(date(2025, 3, 1), date(2025, 3, 1)).unwrap();
            assert_eq!(window.years().count(), 0);

            assert_eq!(DateWindow::year(2025).unwrap().years().collect::<Vec<_>>(), vec![2025]);
        }

        #[test]
        fn utc_bounds() {
            let window = DateWindow::new(date(2025, 1, 1), date(2025, 2, 1)).unwrap();
            let (start, end) = window.to_utc_bounds();
            assert_eq!(start, utc(2025, 1, 1, 0, 0));
            assert_eq!(end, utc(2025, 2, 1, 0, 0));
        }

        #[test]
        fn contains_event_time_uses_day() {
            let window = DateWindow::new(date(2025, 3, 1), date(2025, 3, 2)).unwrap();
            assert!(window.contains_event_time(&EventTime::from_local(utc(2025, 3, 1, 23, 30))));
            assert!(!window.contains_event_time(&EventTime::from_local(utc(2025, 3, 2, 0, 0))));
        }
    }
}
