//! Time source and calendar period helpers
//!
//! Every rule that depends on "now" (overdue classification, number
//! prefixes, monthly rollups) reads it through [`Clock`] so tests can pin
//! time. Calendar periods are computed in UTC.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Source of the current instant
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a settable instant, shared between clones
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(RwLock::new(instant)),
        }
    }

    /// Moves every clone of this clock to `instant`
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *guard = instant;
    }

    /// Moves every clone of this clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut guard = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// A half-open interval `[start, end)` aligned to a calendar unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    /// The calendar month containing `at`
    pub fn month_of(at: DateTime<Utc>) -> Self {
        let first = first_of_month(at.date_naive());
        Self {
            start: midnight(first),
            end: midnight(first + Months::new(1)),
        }
    }

    /// The calendar month before the one containing `at`
    pub fn previous_month_of(at: DateTime<Utc>) -> Self {
        let first = first_of_month(at.date_naive());
        Self {
            start: midnight(first - Months::new(1)),
            end: midnight(first),
        }
    }

    /// The calendar month `offset` months away from the one containing `at`
    pub fn month_offset(at: DateTime<Utc>, offset: i32) -> Self {
        let first = first_of_month(at.date_naive());
        let shifted = if offset >= 0 {
            first + Months::new(offset.unsigned_abs())
        } else {
            first - Months::new(offset.unsigned_abs())
        };
        Self {
            start: midnight(shifted),
            end: midnight(shifted + Months::new(1)),
        }
    }

    /// The UTC day containing `at`
    pub fn day_of(at: DateTime<Utc>) -> Self {
        let day = at.date_naive();
        Self {
            start: midnight(day),
            end: midnight(day + Duration::days(1)),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_boundaries() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let month = Period::month_of(at);
        assert_eq!(month.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(month.end, Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        assert!(month.contains(at));
        assert!(!month.contains(month.end));
    }

    #[test]
    fn test_previous_month_crosses_year() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let prev = Period::previous_month_of(at);
        assert_eq!(prev.start, Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(prev.end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(Period::month_offset(at, -1), prev);
    }

    #[test]
    fn test_fixed_clock_is_shared() {
        let at = Utc.with_ymd_and_hms(2024, 5, 31, 23, 0, 0).unwrap();
        let clock = FixedClock::new(at);
        let other = clock.clone();
        clock.advance(Duration::hours(2));
        assert_eq!(other.now(), Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap());
    }
}
