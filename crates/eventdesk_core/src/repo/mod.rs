//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for sources, venues and
//!   events.
//! - Isolate SQLite query details from import, dedupe and search logic.
//!
//! # Invariants
//! - Repository writes validate records before persistence.
//! - Multi-statement writes run inside a transaction: the caller's when one
//!   is open, otherwise a private one.
//! - Timestamps are stored as UTC epoch milliseconds.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

pub mod event_repo;
pub mod source_repo;
pub mod venue_repo;

use event_repo::{RepoError, RepoResult};

/// Runs `write` atomically.
///
/// Joins the caller's transaction when one is already open on `conn`, so an
/// import batch or squash stays a single unit of work.
pub(crate) fn with_write_scope<T>(
    conn: &Connection,
    write: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    if !conn.is_autocommit() {
        return write(conn);
    }

    let tx = conn.unchecked_transaction()?;
    let value = write(&tx)?;
    tx.commit()?;
    Ok(value)
}

pub(crate) fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn from_millis(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("timestamp `{value}` out of range in {column}"))
    })
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}
