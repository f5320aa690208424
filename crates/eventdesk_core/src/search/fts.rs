//! SQLite FTS5-based keyword search over events.
//!
//! # Responsibility
//! - Turn free text into a safe FTS5 match expression.
//! - Return matching non-duplicate events in the requested order.
//!
//! # Invariants
//! - Every user term is quoted; terms are AND-ed.
//! - Result ordering is deterministic: ties fall back to start time and
//!   insertion order.

use crate::db::DbError;
use crate::model::event::Event;
use crate::repo::event_repo::{parse_event_row, RepoError, EVENT_COLUMNS_SQL};
use crate::search::grouped::SearchOrder;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Invalid combination of search inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchUsage {
    /// Neither a query nor a tag was given.
    NothingToSearch,
    /// Both a query and a tag were given.
    QueryAndTag,
}

impl Display for SearchUsage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingToSearch => write!(f, "enter a search query or pick a tag"),
            Self::QueryAndTag => write!(f, "search by query or by tag, not both"),
        }
    }
}

/// Search-layer error for usage, query parsing, DB interaction and decoding.
#[derive(Debug)]
pub enum SearchError {
    Usage(SearchUsage),
    /// Query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(usage) => write!(f, "{usage}"),
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RepoError> for SearchError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

/// Returns non-duplicate events matching every term of `text`.
///
/// Returns an empty list for blank text.
pub fn keyword_events(
    conn: &Connection,
    text: &str,
    order: SearchOrder,
) -> SearchResult<Vec<Event>> {
    let Some(match_expr) = build_match_expression(text) else {
        return Ok(Vec::new());
    };

    let sql = format!(
        "SELECT {EVENT_COLUMNS_SQL}
         FROM events_fts
         JOIN events e ON e.rowid = events_fts.rowid
         LEFT JOIN venues v ON v.uuid = e.venue_uuid
         WHERE events_fts MATCH ?1
           AND e.duplicate_of_uuid IS NULL
         ORDER BY {}",
        order.order_clause()
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query([match_expr.as_str()])
        .map_err(|err| map_query_error(err, &match_expr))?;
    let mut events = Vec::new();

    while let Some(row) = rows
        .next()
        .map_err(|err| map_query_error(err, &match_expr))?
    {
        events.push(parse_event_row(conn, row)?);
    }

    Ok(events)
}

/// Quotes each whitespace-separated term and joins them with `AND`.
pub(crate) fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }

    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::build_match_expression;

    #[test]
    fn terms_are_quoted_and_joined() {
        assert_eq!(
            build_match_expression("  jazz  \"blue\" note "),
            Some("\"jazz\" AND \"\"\"blue\"\"\" AND \"note\"".to_string())
        );
    }

    #[test]
    fn blank_text_has_no_expression() {
        assert_eq!(build_match_expression(" \t "), None);
    }
}
