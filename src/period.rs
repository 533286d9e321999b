//! Fiscal period calculus
//!
//! Maps a reference date onto the latest *completed* calendar month and fiscal
//! quarter, and steps periods across year boundaries. Every function takes the
//! reference date explicitly so nothing here reads the wall clock.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Month numbers that close a fiscal quarter
pub const QUARTER_END_MONTHS: [u32; 4] = [3, 6, 9, 12];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be in 1..=12, got {0}")]
    InvalidMonth(u32),

    #[error("quarter-end month must be one of 3, 6, 9, 12, got {0}")]
    InvalidQuarterEndMonth(u32),

    #[error("cannot parse period date: {0:?}")]
    UnparseableDate(String),
}

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawYearMonth")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawYearMonth {
    year: i32,
    month: u32,
}

impl TryFrom<RawYearMonth> for YearMonth {
    type Error = PeriodError;

    fn try_from(raw: RawYearMonth) -> Result<Self, Self::Error> {
        YearMonth::new(raw.year, raw.month)
    }
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    fn index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month - 1)
    }

    fn from_index(index: i64) -> Self {
        Self {
            year: clamp_year(index.div_euclid(12)),
            // rem_euclid(12) is always in 0..12
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// The month `n` months earlier
    pub fn step_back(self, n: u32) -> Self {
        Self::from_index(self.index() - i64::from(n))
    }

    /// The month `n` months later
    pub fn step_forward(self, n: u32) -> Self {
        Self::from_index(self.index() + i64::from(n))
    }

    /// Same month, one calendar year earlier
    pub fn prior_year(self) -> Self {
        self.step_back(12)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// A fiscal quarter identified by its closing month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawQuarter")]
pub struct Quarter {
    year: i32,
    end_month: u32,
}

#[derive(Deserialize)]
struct RawQuarter {
    year: i32,
    end_month: u32,
}

impl TryFrom<RawQuarter> for Quarter {
    type Error = PeriodError;

    fn try_from(raw: RawQuarter) -> Result<Self, Self::Error> {
        Quarter::new(raw.year, raw.end_month)
    }
}

impl Quarter {
    pub fn new(year: i32, end_month: u32) -> Result<Self, PeriodError> {
        if !QUARTER_END_MONTHS.contains(&end_month) {
            return Err(PeriodError::InvalidQuarterEndMonth(end_month));
        }
        Ok(Self { year, end_month })
    }

    /// Parse a provider date such as `2025-06-30` into the quarter it closes.
    ///
    /// Only the `YYYY-MM-DD` prefix is read, so timestamps with a time part are
    /// accepted as well. The date must be the quarter's own end date.
    pub fn from_end_date(date: &str) -> Result<Self, PeriodError> {
        let prefix = date
            .get(..10)
            .ok_or_else(|| PeriodError::UnparseableDate(date.to_string()))?;
        let parsed = NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
            .map_err(|_| PeriodError::UnparseableDate(date.to_string()))?;
        let quarter = Self::new(parsed.year(), parsed.month())?;
        if parsed.day() != quarter.end_day() {
            return Err(PeriodError::UnparseableDate(date.to_string()));
        }
        Ok(quarter)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn end_month(&self) -> u32 {
        self.end_month
    }

    /// Quarter number within the year, 1..=4
    pub fn number(&self) -> u32 {
        self.end_month / 3
    }

    fn index(&self) -> i64 {
        i64::from(self.year) * 4 + i64::from(self.number() - 1)
    }

    fn from_index(index: i64) -> Self {
        Self {
            year: clamp_year(index.div_euclid(4)),
            end_month: (index.rem_euclid(4) as u32 + 1) * 3,
        }
    }

    /// The quarter `n` quarters earlier
    pub fn step_back(self, n: u32) -> Self {
        Self::from_index(self.index() - i64::from(n))
    }

    /// The quarter `n` quarters later
    pub fn step_forward(self, n: u32) -> Self {
        Self::from_index(self.index() + i64::from(n))
    }

    /// Same quarter, one calendar year earlier
    pub fn prior_year(self) -> Self {
        self.step_back(4)
    }

    /// Calendar end date as `YYYY-MM-DD`.
    ///
    /// Day 30 for June and September, 31 for March and December. Quarter ends
    /// never fall in February so no leap-year handling is needed.
    pub fn end_date(&self) -> String {
        format!("{}-{:02}-{}", self.year, self.end_month, self.end_day())
    }

    fn end_day(&self) -> u32 {
        match self.end_month {
            6 | 9 => 30,
            _ => 31,
        }
    }

    /// Two-digit year plus quarter number, e.g. `25Q1`
    pub fn label(&self) -> String {
        format!("{}Q{}", two_digit_year(self.year), self.number())
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Either a calendar month or a fiscal quarter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum FiscalPeriod {
    Month(YearMonth),
    Quarter(Quarter),
}

impl FiscalPeriod {
    pub fn year(&self) -> i32 {
        match self {
            FiscalPeriod::Month(m) => m.year(),
            FiscalPeriod::Quarter(q) => q.year(),
        }
    }

    pub fn is_month(&self) -> bool {
        matches!(self, FiscalPeriod::Month(_))
    }

    pub fn is_quarter(&self) -> bool {
        matches!(self, FiscalPeriod::Quarter(_))
    }
}

impl From<YearMonth> for FiscalPeriod {
    fn from(month: YearMonth) -> Self {
        FiscalPeriod::Month(month)
    }
}

impl From<Quarter> for FiscalPeriod {
    fn from(quarter: Quarter) -> Self {
        FiscalPeriod::Quarter(quarter)
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiscalPeriod::Month(m) => m.fmt(f),
            FiscalPeriod::Quarter(q) => q.fmt(f),
        }
    }
}

fn clamp_year(year: i64) -> i32 {
    year.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Last two digits of a year, zero padded
pub fn two_digit_year(year: i32) -> String {
    format!("{:02}", year.rem_euclid(100))
}

/// The month strictly before the month containing `now`
pub fn latest_completed_month(now: NaiveDate) -> YearMonth {
    YearMonth {
        year: now.year(),
        month: now.month(),
    }
    .step_back(1)
}

/// The most recent quarter whose closing month is strictly before `now`'s month.
///
/// January through March roll back to December of the prior year.
pub fn latest_completed_quarter(now: NaiveDate) -> Quarter {
    let end_month = (now.month() - 1) / 3 * 3;
    if end_month == 0 {
        Quarter {
            year: now.year() - 1,
            end_month: 12,
        }
    } else {
        Quarter {
            year: now.year(),
            end_month,
        }
    }
}

pub fn step_back_month(month: YearMonth, n: u32) -> YearMonth {
    month.step_back(n)
}

pub fn step_back_quarter(quarter: Quarter, n: u32) -> Quarter {
    quarter.step_back(n)
}

pub fn quarter_end_date(quarter: Quarter) -> String {
    quarter.end_date()
}

pub fn quarter_label(quarter: Quarter) -> String {
    quarter.label()
}

/// The latest `count` completed months, newest first
pub fn recent_completed_months(now: NaiveDate, count: u32) -> Vec<YearMonth> {
    let latest = latest_completed_month(now);
    (0..count).map(|n| latest.step_back(n)).collect()
}

/// The latest `count` completed quarters, newest first
pub fn recent_completed_quarters(now: NaiveDate, count: u32) -> Vec<Quarter> {
    let latest = latest_completed_quarter(now);
    (0..count).map(|n| latest.step_back(n)).collect()
}
