//! Keyword or tag search grouped into past and current events.
//!
//! # Invariants
//! - Exactly one of query and tag drives a search; anything else is a usage
//!   error and produces no groups.
//! - An event is past when its end (or start, without an end) is before `now`.
//! - Group members keep the order the search produced.

use crate::model::event::{normalize_tag, Event};
use crate::repo::event_repo::{parse_event_row, EVENT_COLUMNS_SQL};
use crate::search::fts::{keyword_events, SearchError, SearchResult, SearchUsage};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Result ordering requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    /// Start time.
    #[default]
    Date,
    /// Title, case-insensitive.
    Name,
    /// Venue title, events without a venue last.
    Venue,
    /// Full-text relevance. Keyword search only.
    Score,
}

impl SearchOrder {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "date" => Some(Self::Date),
            "name" => Some(Self::Name),
            "venue" => Some(Self::Venue),
            "score" => Some(Self::Score),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Name => "name",
            Self::Venue => "venue",
            Self::Score => "score",
        }
    }

    /// `ORDER BY` body for queries aliasing events as `e` and venues as `v`.
    pub(crate) fn order_clause(self) -> &'static str {
        match self {
            Self::Date => "e.start_time ASC, e.rowid ASC",
            Self::Name => "e.title COLLATE NOCASE ASC, e.start_time ASC, e.rowid ASC",
            Self::Venue => {
                "v.title IS NULL, v.title COLLATE NOCASE ASC, e.start_time ASC, e.rowid ASC"
            }
            Self::Score => "bm25(events_fts) ASC, e.start_time ASC, e.rowid ASC",
        }
    }
}

/// Non-fatal adjustment made while running a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchWarning {
    /// Order name not recognized; the default order was used.
    UnknownOrder(String),
    /// Relevance order requested for a tag search; the default order was used.
    ScoreWithTag,
    /// Relevance order requested for a listing without a query.
    ScoreWithoutQuery,
}

impl Display for SearchWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOrder(name) => {
                write!(f, "unknown sort order `{name}`, sorting by date instead")
            }
            Self::ScoreWithTag => write!(
                f,
                "tag searches cannot be sorted by relevance, sorting by date instead"
            ),
            Self::ScoreWithoutQuery => write!(
                f,
                "listings cannot be sorted by relevance, sorting by date instead"
            ),
        }
    }
}

/// Search inputs as received from a caller. Blank strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub tag: Option<String>,
    pub order: Option<String>,
    /// Leave the past group empty.
    pub current_only: bool,
}

impl SearchRequest {
    pub fn keyword(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn ordered_by(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn current_only(mut self) -> Self {
        self.current_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedEvents {
    pub past: Vec<Event>,
    pub current: Vec<Event>,
    /// Order actually applied.
    pub order: SearchOrder,
    pub warnings: Vec<SearchWarning>,
}

impl GroupedEvents {
    pub fn total(&self) -> usize {
        self.past.len() + self.current.len()
    }
}

enum Criterion {
    Keyword(String),
    Tag(String),
}

/// Runs a keyword or tag search and splits the hits around `now`.
pub fn search(
    conn: &Connection,
    request: &SearchRequest,
    now: DateTime<Utc>,
) -> SearchResult<GroupedEvents> {
    let criterion = resolve_criterion(request)?;
    let mut warnings = Vec::new();

    let mut order = match request
        .order
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        None => SearchOrder::default(),
        Some(name) => SearchOrder::parse(name).unwrap_or_else(|| {
            warnings.push(SearchWarning::UnknownOrder(name.to_string()));
            SearchOrder::default()
        }),
    };

    let events = match &criterion {
        Criterion::Keyword(text) => keyword_events(conn, text, order)?,
        Criterion::Tag(tag) => {
            if order == SearchOrder::Score {
                warnings.push(SearchWarning::ScoreWithTag);
                order = SearchOrder::default();
            }
            tagged_events(conn, tag, order)?
        }
    };

    for warning in &warnings {
        warn!(
            "event=search_order module=search status=fallback warning={:?}",
            warning
        );
    }

    let (past, current): (Vec<_>, Vec<_>) =
        events.into_iter().partition(|event| event.is_past(now));
    let past = if request.current_only { Vec::new() } else { past };

    info!(
        "event=search module=search status=ok mode={} order={} past={} current={}",
        match criterion {
            Criterion::Keyword(_) => "keyword",
            Criterion::Tag(_) => "tag",
        },
        order.name(),
        past.len(),
        current.len()
    );

    Ok(GroupedEvents {
        past,
        current,
        order,
        warnings,
    })
}

fn resolve_criterion(request: &SearchRequest) -> SearchResult<Criterion> {
    let query = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());
    let tag = request.tag.as_deref().and_then(normalize_tag);

    match (query, tag) {
        (Some(text), None) => Ok(Criterion::Keyword(text.to_string())),
        (None, Some(tag)) => Ok(Criterion::Tag(tag)),
        (Some(_), Some(_)) => Err(SearchError::Usage(SearchUsage::QueryAndTag)),
        (None, None) => Err(SearchError::Usage(SearchUsage::NothingToSearch)),
    }
}

/// Non-duplicate events carrying `tag`, compared case-insensitively.
fn tagged_events(conn: &Connection, tag: &str, order: SearchOrder) -> SearchResult<Vec<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS_SQL}
         FROM events e
         LEFT JOIN venues v ON v.uuid = e.venue_uuid
         WHERE e.duplicate_of_uuid IS NULL
           AND EXISTS (
               SELECT 1
               FROM event_tags et
               INNER JOIN tags t ON t.id = et.tag_id
               WHERE et.event_uuid = e.uuid
                 AND t.name = ?1 COLLATE NOCASE
           )
         ORDER BY {}",
        order.order_clause()
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([tag])?;
    let mut events = Vec::new();
    while let Some(row) = rows.next()? {
        events.push(parse_event_row(conn, row)?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::{SearchOrder, SearchWarning};

    #[test]
    fn order_names_round_trip() {
        for order in [
            SearchOrder::Date,
            SearchOrder::Name,
            SearchOrder::Venue,
            SearchOrder::Score,
        ] {
            assert_eq!(SearchOrder::parse(order.name()), Some(order));
        }
        assert_eq!(SearchOrder::parse(" SCORE "), Some(SearchOrder::Score));
        assert_eq!(SearchOrder::parse("popularity"), None);
    }

    #[test]
    fn warnings_render_for_display() {
        assert!(SearchWarning::UnknownOrder("x".into())
            .to_string()
            .contains("`x`"));
        assert!(SearchWarning::ScoreWithTag.to_string().contains("relevance"));
    }
}
