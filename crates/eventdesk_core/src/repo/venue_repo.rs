//! Venue repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Name lookups are trimmed and case-insensitive.
//! - When several venues share a name, the oldest one wins.

use crate::model::venue::{Venue, VenueId};
use crate::repo::event_repo::RepoResult;
use crate::repo::{parse_optional_uuid, parse_uuid};
use rusqlite::{params, Connection, Row};

const VENUE_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    address,
    url,
    source_uuid
FROM venues";

pub trait VenueRepository {
    fn create_venue(&self, venue: &Venue) -> RepoResult<VenueId>;
    fn get_venue(&self, id: VenueId) -> RepoResult<Option<Venue>>;
    fn find_by_title(&self, title: &str) -> RepoResult<Option<Venue>>;
    fn list_venues(&self) -> RepoResult<Vec<Venue>>;
}

pub struct SqliteVenueRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVenueRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl VenueRepository for SqliteVenueRepository<'_> {
    fn create_venue(&self, venue: &Venue) -> RepoResult<VenueId> {
        venue.validate()?;

        self.conn.execute(
            "INSERT INTO venues (uuid, title, address, url, source_uuid)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                venue.uuid.to_string(),
                venue.title.trim(),
                venue.address.as_deref(),
                venue.url.as_deref(),
                venue.source_id.map(|id| id.to_string()),
            ],
        )?;
        Ok(venue.uuid)
    }

    fn get_venue(&self, id: VenueId) -> RepoResult<Option<Venue>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{VENUE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_venue_row(row)?));
        }
        Ok(None)
    }

    fn find_by_title(&self, title: &str) -> RepoResult<Option<Venue>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VENUE_SELECT_SQL}
             WHERE title = trim(?1) COLLATE NOCASE
             ORDER BY rowid ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([title])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_venue_row(row)?));
        }
        Ok(None)
    }

    fn list_venues(&self) -> RepoResult<Vec<Venue>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VENUE_SELECT_SQL} ORDER BY title COLLATE NOCASE ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut venues = Vec::new();
        while let Some(row) = rows.next()? {
            venues.push(parse_venue_row(row)?);
        }
        Ok(venues)
    }
}

fn parse_venue_row(row: &Row<'_>) -> RepoResult<Venue> {
    let uuid_text: String = row.get("uuid")?;
    let venue = Venue {
        uuid: parse_uuid(&uuid_text, "venues.uuid")?,
        title: row.get("title")?,
        address: row.get("address")?,
        url: row.get("url")?,
        source_id: parse_optional_uuid(row.get("source_uuid")?, "venues.source_uuid")?,
    };
    venue.validate()?;
    Ok(venue)
}
