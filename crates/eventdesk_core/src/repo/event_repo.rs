//! Event repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and listing APIs over the `events` table and its tags.
//! - Own the `duplicate_of` write primitives used by the squash path.
//!
//! # Invariants
//! - Write paths call `Event::validate()` before SQL mutations.
//! - Tag sets are replaced wholesale, never merged implicitly.
//! - Default listings exclude events with `duplicate_of` set.
//! - Listing order is deterministic: ties fall back to insertion order.

use crate::db::DbError;
use crate::model::event::{normalize_tags, Event, EventId, EventValidationError};
use crate::model::source::{SourceId, SourceValidationError};
use crate::model::venue::VenueValidationError;
use crate::repo::{
    from_millis, parse_optional_uuid, parse_uuid, to_millis, with_write_scope,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub(crate) const EVENT_COLUMNS_SQL: &str = "
    e.uuid AS uuid,
    e.title AS title,
    e.description AS description,
    e.url AS url,
    e.start_time AS start_time,
    e.end_time AS end_time,
    e.venue_uuid AS venue_uuid,
    e.source_uuid AS source_uuid,
    e.duplicate_of_uuid AS duplicate_of_uuid";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    InvalidEvent(EventValidationError),
    InvalidVenue(VenueValidationError),
    InvalidSource(SourceValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEvent(err) => write!(f, "{err}"),
            Self::InvalidVenue(err) => write!(f, "{err}"),
            Self::InvalidSource(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEvent(err) => Some(err),
            Self::InvalidVenue(err) => Some(err),
            Self::InvalidSource(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<EventValidationError> for RepoError {
    fn from(value: EventValidationError) -> Self {
        Self::InvalidEvent(value)
    }
}

impl From<VenueValidationError> for RepoError {
    fn from(value: VenueValidationError) -> Self {
        Self::InvalidVenue(value)
    }
}

impl From<SourceValidationError> for RepoError {
    fn from(value: SourceValidationError) -> Self {
        Self::InvalidSource(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Ordering for event listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventListOrder {
    /// `start_time ASC`, insertion order on ties.
    #[default]
    StartTime,
    /// Pure insertion order.
    Insertion,
    /// Title, case-insensitive, then start time.
    Title,
    /// Venue title, case-insensitive, events without a venue last.
    VenueTitle,
}

/// Query options for listing events.
#[derive(Debug, Clone, Default)]
pub struct EventListQuery {
    pub include_duplicates: bool,
    pub source_id: Option<SourceId>,
    /// Inclusive lower bound on `start_time`.
    pub starts_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `start_time`.
    pub starts_before: Option<DateTime<Utc>>,
    /// Keeps events whose end (or start when no end) is at or after this.
    pub ends_after: Option<DateTime<Utc>>,
    pub order: EventListOrder,
    pub limit: Option<u32>,
}

/// Repository interface for event persistence.
pub trait EventRepository {
    fn create_event(&self, event: &Event) -> RepoResult<EventId>;
    fn update_event(&self, event: &Event) -> RepoResult<()>;
    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>>;
    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<Event>>;
    /// Finds an event previously imported from `source_id` with the same
    /// case-insensitive title and start time.
    fn find_imported(
        &self,
        source_id: SourceId,
        title: &str,
        start_time: DateTime<Utc>,
    ) -> RepoResult<Option<Event>>;
    /// Sets `duplicate_of` without touching any other column.
    fn mark_duplicate(&self, id: EventId, canonical_id: EventId) -> RepoResult<()>;
    /// Re-points every event marked as a duplicate of `from` to `to`.
    fn repoint_duplicates(&self, from: EventId, to: EventId) -> RepoResult<usize>;
    fn delete_event(&self, id: EventId) -> RepoResult<()>;
}

/// SQLite-backed event repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_event(&self, event: &Event) -> RepoResult<EventId> {
        event.validate()?;

        with_write_scope(self.conn, |conn| {
            conn.execute(
                "INSERT INTO events (
                    uuid,
                    title,
                    description,
                    url,
                    start_time,
                    end_time,
                    venue_uuid,
                    source_uuid,
                    duplicate_of_uuid
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    event.uuid.to_string(),
                    event.title.as_str(),
                    event.description.as_deref(),
                    event.url.as_deref(),
                    to_millis(event.start_time),
                    event.end_time.map(to_millis),
                    event.venue_id.map(|id| id.to_string()),
                    event.source_id.map(|id| id.to_string()),
                    event.duplicate_of.map(|id| id.to_string()),
                ],
            )?;
            replace_tags(conn, event.uuid, &event.tags)?;
            Ok(event.uuid)
        })
    }

    fn update_event(&self, event: &Event) -> RepoResult<()> {
        event.validate()?;

        with_write_scope(self.conn, |conn| {
            let changed = conn.execute(
                "UPDATE events
                 SET
                    title = ?1,
                    description = ?2,
                    url = ?3,
                    start_time = ?4,
                    end_time = ?5,
                    venue_uuid = ?6,
                    source_uuid = ?7,
                    duplicate_of_uuid = ?8,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?9;",
                params![
                    event.title.as_str(),
                    event.description.as_deref(),
                    event.url.as_deref(),
                    to_millis(event.start_time),
                    event.end_time.map(to_millis),
                    event.venue_id.map(|id| id.to_string()),
                    event.source_id.map(|id| id.to_string()),
                    event.duplicate_of.map(|id| id.to_string()),
                    event.uuid.to_string(),
                ],
            )?;

            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: "event",
                    id: event.uuid,
                });
            }

            replace_tags(conn, event.uuid, &event.tags)
        })
    }

    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {EVENT_COLUMNS_SQL} FROM events e WHERE e.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_event_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<Event>> {
        let mut sql = format!(
            "SELECT {EVENT_COLUMNS_SQL}
             FROM events e
             LEFT JOIN venues v ON v.uuid = e.venue_uuid
             WHERE 1 = 1"
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_duplicates {
            sql.push_str(" AND e.duplicate_of_uuid IS NULL");
        }
        if let Some(source_id) = query.source_id {
            sql.push_str(" AND e.source_uuid = ?");
            bind_values.push(Value::Text(source_id.to_string()));
        }
        if let Some(from) = query.starts_from {
            sql.push_str(" AND e.start_time >= ?");
            bind_values.push(Value::Integer(to_millis(from)));
        }
        if let Some(before) = query.starts_before {
            sql.push_str(" AND e.start_time < ?");
            bind_values.push(Value::Integer(to_millis(before)));
        }
        if let Some(after) = query.ends_after {
            sql.push_str(" AND COALESCE(e.end_time, e.start_time) >= ?");
            bind_values.push(Value::Integer(to_millis(after)));
        }

        match query.order {
            EventListOrder::StartTime => sql.push_str(" ORDER BY e.start_time ASC, e.rowid ASC"),
            EventListOrder::Insertion => sql.push_str(" ORDER BY e.rowid ASC"),
            EventListOrder::Title => sql.push_str(
                " ORDER BY e.title COLLATE NOCASE ASC, e.start_time ASC, e.rowid ASC",
            ),
            EventListOrder::VenueTitle => sql.push_str(
                " ORDER BY v.title IS NULL, v.title COLLATE NOCASE ASC, e.start_time ASC, e.rowid ASC",
            ),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(self.conn, row)?);
        }
        Ok(events)
    }

    fn find_imported(
        &self,
        source_id: SourceId,
        title: &str,
        start_time: DateTime<Utc>,
    ) -> RepoResult<Option<Event>> {
        let id_text: Option<String> = self
            .conn
            .query_row(
                "SELECT uuid
                 FROM events
                 WHERE source_uuid = ?1
                   AND lower(trim(title)) = lower(trim(?2))
                   AND start_time = ?3
                 ORDER BY rowid ASC
                 LIMIT 1;",
                params![source_id.to_string(), title, to_millis(start_time)],
                |row| row.get(0),
            )
            .optional()?;

        match id_text {
            Some(text) => self.get_event(parse_uuid(&text, "events.uuid")?),
            None => Ok(None),
        }
    }

    fn mark_duplicate(&self, id: EventId, canonical_id: EventId) -> RepoResult<()> {
        if id == canonical_id {
            return Err(EventValidationError::SelfDuplicate(id).into());
        }

        let changed = self.conn.execute(
            "UPDATE events
             SET
                duplicate_of_uuid = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND duplicate_of_uuid IS NOT ?2;",
            params![id.to_string(), canonical_id.to_string()],
        )?;

        if changed == 0 && !event_exists(self.conn, id)? {
            return Err(RepoError::NotFound { entity: "event", id });
        }
        Ok(())
    }

    fn repoint_duplicates(&self, from: EventId, to: EventId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE events
             SET
                duplicate_of_uuid = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE duplicate_of_uuid = ?1
               AND uuid <> ?2;",
            params![from.to_string(), to.to_string()],
        )?;
        Ok(changed)
    }

    fn delete_event(&self, id: EventId) -> RepoResult<()> {
        with_write_scope(self.conn, |conn| {
            // Duplicates of a deleted canonical become regular events again.
            conn.execute(
                "UPDATE events SET duplicate_of_uuid = NULL WHERE duplicate_of_uuid = ?1;",
                [id.to_string()],
            )?;
            let changed = conn.execute("DELETE FROM events WHERE uuid = ?1;", [id.to_string()])?;
            if changed == 0 {
                return Err(RepoError::NotFound { entity: "event", id });
            }
            Ok(())
        })
    }
}

/// Decodes one row selected with [`EVENT_COLUMNS_SQL`] and loads its tags.
pub(crate) fn parse_event_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Event> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "events.uuid")?;

    let event = Event {
        uuid,
        title: row.get("title")?,
        description: row.get("description")?,
        url: row.get("url")?,
        start_time: from_millis(row.get("start_time")?, "events.start_time")?,
        end_time: row
            .get::<_, Option<i64>>("end_time")?
            .map(|value| from_millis(value, "events.end_time"))
            .transpose()?,
        tags: load_tags(conn, &uuid_text)?,
        venue_id: parse_optional_uuid(row.get("venue_uuid")?, "events.venue_uuid")?,
        source_id: parse_optional_uuid(row.get("source_uuid")?, "events.source_uuid")?,
        duplicate_of: parse_optional_uuid(
            row.get("duplicate_of_uuid")?,
            "events.duplicate_of_uuid",
        )?,
    };
    event.validate()?;
    Ok(event)
}

fn load_tags(conn: &Connection, event_uuid: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name
         FROM event_tags et
         INNER JOIN tags t ON t.id = et.tag_id
         WHERE et.event_uuid = ?1
         ORDER BY t.name COLLATE NOCASE ASC;",
    )?;
    let mut rows = stmt.query([event_uuid])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        tags.push(value.to_lowercase());
    }
    Ok(tags)
}

fn replace_tags(conn: &Connection, event_id: EventId, tags: &[String]) -> RepoResult<()> {
    let event_uuid = event_id.to_string();
    conn.execute(
        "DELETE FROM event_tags WHERE event_uuid = ?1;",
        [event_uuid.as_str()],
    )?;

    for tag in normalize_tags(tags) {
        conn.execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1);",
            [tag.as_str()],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO event_tags (event_uuid, tag_id)
             SELECT ?1, id
             FROM tags
             WHERE name = ?2 COLLATE NOCASE;",
            params![event_uuid.as_str(), tag.as_str()],
        )?;
    }
    Ok(())
}

fn event_exists(conn: &Connection, id: EventId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
