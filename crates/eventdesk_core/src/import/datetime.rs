//! Parsing of candidate date and time components.
//!
//! # Invariants
//! - Dates and times are parsed independently, then combined as UTC.
//! - A missing time means midnight; a missing date is an error.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

const TIME_FORMATS: &[&str] = &[
    "%H:%M",
    "%H:%M:%S",
    "%H%M%S",
    "%H%M",
    "%I:%M %p",
    "%I:%M%p",
    "%I:%M:%S %p",
];

static HOUR_MERIDIEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\s*([ap])\.?m\.?$").expect("valid hour-meridiem regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeError {
    MissingDate,
    InvalidDate(String),
    InvalidTime(String),
}

impl Display for DateTimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDate => write!(f, "date is missing"),
            Self::InvalidDate(value) => write!(f, "invalid date `{value}`"),
            Self::InvalidTime(value) => write!(f, "invalid time `{value}`"),
        }
    }
}

impl Error for DateTimeError {}

/// Parses a calendar date in any accepted format.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Parses a wall-clock time in any accepted format. A trailing `Z` is ignored.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let value = raw.trim();
    let value = value
        .strip_suffix(['Z', 'z'])
        .unwrap_or(value)
        .trim();
    if value.is_empty() {
        return None;
    }

    if let Some(caps) = HOUR_MERIDIEM_RE.captures(value) {
        let hour: u32 = caps[1].parse().ok()?;
        if !(1..=12).contains(&hour) {
            return None;
        }
        let hour = match (hour, caps[2].eq_ignore_ascii_case("p")) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }

    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

/// Combines separate date and time components into a UTC timestamp.
pub fn combine(date: Option<&str>, time: Option<&str>) -> Result<DateTime<Utc>, DateTimeError> {
    let date_text = date
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(DateTimeError::MissingDate)?;
    let day =
        parse_date(date_text).ok_or_else(|| DateTimeError::InvalidDate(date_text.to_string()))?;

    let clock = match time.map(str::trim).filter(|value| !value.is_empty()) {
        Some(text) => parse_time(text).ok_or_else(|| DateTimeError::InvalidTime(text.to_string()))?,
        None => NaiveTime::default(),
    };

    Ok(day.and_time(clock).and_utc())
}

#[cfg(test)]
mod tests {
    use super::{combine, parse_date, parse_time, DateTimeError};
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    #[test]
    fn dates_accept_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        for raw in ["2026-10-20", "20261020", "10/20/2026", "2026/10/20", "October 20, 2026"] {
            assert_eq!(parse_date(raw), Some(expected), "layout {raw}");
        }
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("2026-02-30"), None);
    }

    #[test]
    fn times_accept_clock_and_meridiem_forms() {
        let seven_pm = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        for raw in ["19:00", "19:00:00", "190000", "190000Z", "7:00 PM", "7pm", "7 p.m."] {
            assert_eq!(parse_time(raw), Some(seven_pm), "layout {raw}");
        }
        assert_eq!(parse_time("12am"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(parse_time("13pm"), None);
    }

    #[test]
    fn combine_defaults_to_midnight_and_reports_bad_parts() {
        assert_eq!(
            combine(Some("2026-10-20"), None).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).unwrap()
        );
        assert_eq!(combine(None, Some("19:00")), Err(DateTimeError::MissingDate));
        assert!(matches!(
            combine(Some("soon"), None),
            Err(DateTimeError::InvalidDate(_))
        ));
        assert!(matches!(
            combine(Some("2026-10-20"), Some("late")),
            Err(DateTimeError::InvalidTime(_))
        ));
    }
}
