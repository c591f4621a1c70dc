use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar month bucket rendered as `YYYY-MM`.
///
/// Ordering is (year, month), which matches the lexicographic order of the
/// rendered key for four-digit years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (0..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Bucket for an instant, using its UTC calendar date.
    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self::of_date(timestamp.date_naive())
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Long form used in tables, e.g. "March 2024".
    pub fn label(&self) -> String {
        let index = (self.month as usize).saturating_sub(1).min(11);
        format!("{} {}", MONTH_NAMES[index], self.year)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a YYYY-MM month key")]
pub struct MonthKeyParseError(pub String);

impl FromStr for MonthKey {
    type Err = MonthKeyParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || MonthKeyParseError(raw.to_string());
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        MonthKey::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateRangeError {
    #[error("range start {start} is after range end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("cannot step back {0} months from the given date")]
    OutOfBounds(u32),
}

/// Inclusive analysis window expressed in calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// January 1st of `today`'s year through `today`.
    pub fn year_to_date(today: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        Self { start, end: today }
    }

    /// The `months` calendar months ending at `today`. Day-of-month clamps to the
    /// shorter month (March 31 minus one month is February 28/29).
    pub fn last_months(months: u32, today: NaiveDate) -> Result<Self, DateRangeError> {
        let start = today
            .checked_sub_months(Months::new(months))
            .ok_or(DateRangeError::OutOfBounds(months))?;
        Ok(Self { start, end: today })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Compares only the calendar date of the instant, never the time of day.
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.contains_date(timestamp.date_naive())
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// First instant of the start date, used as the store's lower bound.
    pub fn start_of_day(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// First instant after the end date, the store's exclusive upper bound.
    /// `None` only when the end date is the last representable day.
    pub fn end_exclusive(&self) -> Option<DateTime<Utc>> {
        self.end
            .succ_opt()
            .map(|next| Utc.from_utc_datetime(&next.and_time(NaiveTime::MIN)))
    }
}
