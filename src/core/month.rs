//! Calendar month arithmetic.
//!
//! Bills belong to a `YYYY-MM` month and fall due on a day clamped to that month's length, so
//! a due day of 31 lands on Feb 28/29, Apr 30, and so on. Every due date in the engine is
//! built through [`YearMonth::day_clamped`].

use crate::errors::{Error, Result};
use chrono::{Datelike, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Builds a month, rejecting month numbers outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidMonth {
                value: format!("{year:04}-{month:02}"),
            });
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in UTC.
    #[must_use]
    pub fn current() -> Self {
        Self::of(Utc::now().date_naive())
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month number, 1-based.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// Shifts by `delta` months (negative goes back).
    #[must_use]
    pub const fn add_months(self, delta: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + delta;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Number of days in the month: the day before the first of the next month.
    #[must_use]
    pub fn days_in_month(self) -> u32 {
        let next = self.add_months(1);
        NaiveDate::from_ymd_opt(next.year, next.month, 1)
            .and_then(|first| first.pred_opt())
            .map_or(31, |last| last.day())
    }

    /// Date for `due_day` in this month: `min(due_day, days_in_month)`.
    ///
    /// Due days below 1 or above 31 are rejected.
    pub fn day_clamped(self, due_day: i32) -> Result<NaiveDate> {
        if !(1..=31).contains(&due_day) {
            return Err(Error::InvalidDueDay { day: due_day });
        }
        #[allow(clippy::cast_sign_loss)]
        let day = (due_day as u32).min(self.days_in_month());
        NaiveDate::from_ymd_opt(self.year, self.month, day).ok_or_else(|| Error::InvalidMonth {
            value: self.to_string(),
        })
    }

    /// First day of the month.
    pub fn first_day(self) -> Result<NaiveDate> {
        self.day_clamped(1)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMonth {
            value: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}
