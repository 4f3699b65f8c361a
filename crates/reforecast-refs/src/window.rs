//! Calendar window selection.
//!
//! The reforecast archive holds one initialization per day for every year, so
//! a climatology around an anchor date is a set of month-day patterns that is
//! later applied to every archive year.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;
use std::fmt;

/// A month-day pattern, rendered as "MMDD".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayPattern {
    month: u32,
    day: u32,
}

impl DayPattern {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }
}

impl fmt::Display for DayPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.month, self.day)
    }
}

/// Month-day patterns of every calendar day within `radius` days of `date`.
///
/// Callers must treat the result as a set; the `BTreeSet` ordering is only
/// there to keep downstream enumeration deterministic.
pub fn day_patterns(date: NaiveDate, radius: u32) -> BTreeSet<DayPattern> {
    let radius = Duration::days(i64::from(radius));
    let (Some(first), Some(last)) = (
        date.checked_sub_signed(radius),
        date.checked_add_signed(radius),
    ) else {
        // Radius beyond the calendar range covers every day of the year.
        return full_year();
    };

    first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(DayPattern::of)
        .collect()
}

fn full_year() -> BTreeSet<DayPattern> {
    // 2000 is a leap year, so Feb 29 is included.
    (1..=12)
        .flat_map(|month| (1..=31).filter_map(move |day| NaiveDate::from_ymd_opt(2000, month, day)))
        .map(DayPattern::of)
        .collect()
}
