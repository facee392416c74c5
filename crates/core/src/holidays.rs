//! Non-business date generation used as the forecaster's holiday regressor.
//!
//! A [`HolidaySet`] is the union of every weekend day, a list of fixed
//! month/day holidays and Easter Monday, over an inclusive year range.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Label attached to every generated date.
pub const DEFAULT_LABEL: &str = "italian_holiday";

/// Italian national holidays that fall on the same day every year.
pub const ITALIAN_FIXED_HOLIDAYS: [MonthDay; 10] = [
    MonthDay::new(1, 1),
    MonthDay::new(1, 6),
    MonthDay::new(4, 25),
    MonthDay::new(5, 1),
    MonthDay::new(6, 2),
    MonthDay::new(8, 15),
    MonthDay::new(11, 1),
    MonthDay::new(12, 8),
    MonthDay::new(12, 25),
    MonthDay::new(12, 26),
];

// ---------------------------------------------------------------------------
// MonthDay
// ---------------------------------------------------------------------------

/// A calendar day without a year, written `MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    pub const fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    /// The concrete date in `year`, or `None` when it does not exist
    /// (e.g. `02-29` outside leap years).
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("invalid month-day '{s}', expected MM-DD"));
        let (month, day) = s.trim().split_once('-').ok_or_else(invalid)?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let day: u32 = day.parse().map_err(|_| invalid())?;
        // 2000 is a leap year, so every day that can ever exist is accepted.
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(invalid());
        }
        Ok(Self { month, day })
    }
}

impl TryFrom<String> for MonthDay {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthDay> for String {
    fn from(value: MonthDay) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// HolidaySet
// ---------------------------------------------------------------------------

/// Sorted, de-duplicated set of non-business dates for a year range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidaySet {
    label: String,
    start_year: i32,
    end_year: i32,
    dates: BTreeSet<NaiveDate>,
}

impl HolidaySet {
    /// A set with no dates, used before the first generation completes.
    pub fn empty() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            start_year: 0,
            end_year: -1,
            dates: BTreeSet::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    /// Whether the set was generated for `year`.
    pub fn covers_year(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

// ---------------------------------------------------------------------------
// HolidayCalendar
// ---------------------------------------------------------------------------

/// Generator for [`HolidaySet`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayCalendar {
    label: String,
    fixed: Vec<MonthDay>,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::italian()
    }
}

impl HolidayCalendar {
    /// Weekends, the Italian fixed holidays and Easter Monday.
    pub fn italian() -> Self {
        Self::with_fixed_dates(ITALIAN_FIXED_HOLIDAYS.to_vec())
    }

    /// Weekends and Easter Monday plus a custom list of fixed holidays.
    pub fn with_fixed_dates(fixed: Vec<MonthDay>) -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            fixed,
        }
    }

    /// Generate every holiday in `[start_year, end_year]` inclusive.
    pub fn generate(&self, start_year: i32, end_year: i32) -> Result<HolidaySet, CoreError> {
        if start_year > end_year {
            return Err(CoreError::Validation(format!(
                "holiday range start {start_year} is after end {end_year}"
            )));
        }

        let mut dates = BTreeSet::new();
        for year in start_year..=end_year {
            let (Some(first), Some(last)) = (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year, 12, 31),
            ) else {
                return Err(CoreError::Validation(format!("year {year} out of range")));
            };

            dates.extend(
                first
                    .iter_days()
                    .take_while(|d| *d <= last)
                    .filter(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun)),
            );
            dates.extend(self.fixed.iter().filter_map(|md| md.in_year(year)));
            if let Some(monday) = easter_sunday(year).map(|d| d + Duration::days(1)) {
                dates.insert(monday);
            }
        }

        Ok(HolidaySet {
            label: self.label.clone(),
            start_year,
            end_year,
            dates,
        })
    }
}

/// Gregorian Easter Sunday (anonymous computus).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
