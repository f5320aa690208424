//! Date-range filters for event listings.
//!
//! # Invariants
//! - Resolving a filter never fails: every unusable bound falls back to its
//!   default and yields one [`FilterWarning`].
//! - Without a filter at all, defaults apply silently.

use crate::import::datetime::parse_date;
use crate::model::event::Event;
use crate::repo::event_repo::{
    EventListOrder, EventListQuery, EventRepository, RepoResult, SqliteEventRepository,
};
use crate::search::grouped::{SearchOrder, SearchWarning};
use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, Utc};
use log::warn;
use rusqlite::Connection;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Raw date-range input. `None` means the bound was not supplied at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateBound {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundProblem {
    Missing,
    Empty,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterWarning {
    pub bound: DateBound,
    pub problem: BoundProblem,
}

impl Display for FilterWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let bound = match self.bound {
            DateBound::Start => "start",
            DateBound::End => "end",
        };
        let kind = match self.problem {
            BoundProblem::Missing => "a missing",
            BoundProblem::Empty => "an empty",
            BoundProblem::Invalid(_) => "an invalid",
        };
        write!(
            f,
            "You tried to filter events with {kind} {bound} date, the default was used instead"
        )
    }
}

/// Inclusive calendar range applied to event start dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub warnings: Vec<FilterWarning>,
}

impl DateRange {
    /// Default range: today through today plus `months`.
    pub fn default_for(today: NaiveDate, months: u32) -> Self {
        Self {
            start: today,
            end: default_end(today, months),
            warnings: Vec::new(),
        }
    }
}

/// Resolves an optional filter into a usable range.
pub fn resolve_date_range(filter: Option<&DateFilter>, today: NaiveDate, months: u32) -> DateRange {
    let mut range = DateRange::default_for(today, months);
    let Some(filter) = filter else {
        return range;
    };

    match resolve_bound(DateBound::Start, filter.start.as_deref()) {
        Ok(date) => range.start = date,
        Err(warning) => range.warnings.push(warning),
    }
    match resolve_bound(DateBound::End, filter.end.as_deref()) {
        Ok(date) => range.end = date,
        Err(warning) => range.warnings.push(warning),
    }

    for warning in &range.warnings {
        warn!(
            "event=date_filter module=search status=fallback bound={:?} problem={:?}",
            warning.bound, warning.problem
        );
    }
    range
}

fn resolve_bound(bound: DateBound, raw: Option<&str>) -> Result<NaiveDate, FilterWarning> {
    let problem = match raw.map(str::trim) {
        None => BoundProblem::Missing,
        Some("") => BoundProblem::Empty,
        Some(text) => match parse_date(text) {
            Some(date) => return Ok(date),
            None => BoundProblem::Invalid(text.to_string()),
        },
    };
    Err(FilterWarning { bound, problem })
}

fn default_end(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

/// Resolves a listing order name.
///
/// Listings accept `date`, `name` and `venue`; relevance needs a keyword
/// query, so `score` and unknown names fall back to date with a warning.
pub fn resolve_listing_order(name: Option<&str>) -> (SearchOrder, Vec<SearchWarning>) {
    let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) else {
        return (SearchOrder::default(), Vec::new());
    };
    let warning = match SearchOrder::parse(name) {
        Some(SearchOrder::Score) => SearchWarning::ScoreWithoutQuery,
        Some(order) => return (order, Vec::new()),
        None => SearchWarning::UnknownOrder(name.to_string()),
    };
    warn!(
        "event=listing_order module=search status=fallback warning={:?}",
        warning
    );
    (SearchOrder::default(), vec![warning])
}

fn list_order(order: SearchOrder) -> EventListOrder {
    match order {
        SearchOrder::Date | SearchOrder::Score => EventListOrder::StartTime,
        SearchOrder::Name => EventListOrder::Title,
        SearchOrder::Venue => EventListOrder::VenueTitle,
    }
}

/// Non-duplicate events that have not finished before today.
pub fn future(
    conn: &Connection,
    now: DateTime<Utc>,
    order: SearchOrder,
) -> RepoResult<Vec<Event>> {
    SqliteEventRepository::new(conn).list_events(&EventListQuery {
        ends_after: Some(start_of_day(now.date_naive())),
        order: list_order(order),
        ..EventListQuery::default()
    })
}

/// Non-duplicate events starting on any day of `range`.
pub fn within_dates(
    conn: &Connection,
    range: &DateRange,
    order: SearchOrder,
) -> RepoResult<Vec<Event>> {
    let before = range
        .end
        .checked_add_days(Days::new(1))
        .map(start_of_day);
    SqliteEventRepository::new(conn).list_events(&EventListQuery {
        starts_from: Some(start_of_day(range.start)),
        starts_before: before,
        order: list_order(order),
        ..EventListQuery::default()
    })
}
