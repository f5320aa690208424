//! Source repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `url` is unique and always stored in normalized form.
//! - Deleting a source keeps its events; their provenance becomes empty.

use crate::model::source::{Source, SourceId};
use crate::repo::event_repo::{RepoError, RepoResult};
use crate::repo::{from_millis, parse_uuid, to_millis};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

const SOURCE_SELECT_SQL: &str = "SELECT
    uuid,
    url,
    title,
    imported_at
FROM sources";

pub trait SourceRepository {
    fn create_source(&self, source: &Source) -> RepoResult<SourceId>;
    fn update_source(&self, source: &Source) -> RepoResult<()>;
    fn get_source(&self, id: SourceId) -> RepoResult<Option<Source>>;
    fn find_by_url(&self, normalized_url: &str) -> RepoResult<Option<Source>>;
    fn list_sources(&self) -> RepoResult<Vec<Source>>;
    fn mark_imported(&self, id: SourceId, at: DateTime<Utc>) -> RepoResult<()>;
    fn delete_source(&self, id: SourceId) -> RepoResult<()>;
}

pub struct SqliteSourceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSourceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SourceRepository for SqliteSourceRepository<'_> {
    fn create_source(&self, source: &Source) -> RepoResult<SourceId> {
        source.validate()?;

        self.conn.execute(
            "INSERT INTO sources (uuid, url, title, imported_at) VALUES (?1, ?2, ?3, ?4);",
            params![
                source.uuid.to_string(),
                source.url.as_str(),
                source.title.as_deref(),
                source.imported_at.map(to_millis),
            ],
        )?;
        Ok(source.uuid)
    }

    fn update_source(&self, source: &Source) -> RepoResult<()> {
        source.validate()?;

        let changed = self.conn.execute(
            "UPDATE sources
             SET
                url = ?1,
                title = ?2,
                imported_at = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?4;",
            params![
                source.url.as_str(),
                source.title.as_deref(),
                source.imported_at.map(to_millis),
                source.uuid.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "source",
                id: source.uuid,
            });
        }
        Ok(())
    }

    fn get_source(&self, id: SourceId) -> RepoResult<Option<Source>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SOURCE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_source_row(row)?));
        }
        Ok(None)
    }

    fn find_by_url(&self, normalized_url: &str) -> RepoResult<Option<Source>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SOURCE_SELECT_SQL} WHERE url = ?1;"))?;
        let mut rows = stmt.query([normalized_url])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_source_row(row)?));
        }
        Ok(None)
    }

    fn list_sources(&self) -> RepoResult<Vec<Source>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SOURCE_SELECT_SQL} ORDER BY COALESCE(title, url) COLLATE NOCASE ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut sources = Vec::new();
        while let Some(row) = rows.next()? {
            sources.push(parse_source_row(row)?);
        }
        Ok(sources)
    }

    fn mark_imported(&self, id: SourceId, at: DateTime<Utc>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE sources
             SET
                imported_at = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), to_millis(at)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "source",
                id,
            });
        }
        Ok(())
    }

    fn delete_source(&self, id: SourceId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sources WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "source",
                id,
            });
        }
        Ok(())
    }
}

fn parse_source_row(row: &Row<'_>) -> RepoResult<Source> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Source {
        uuid: parse_uuid(&uuid_text, "sources.uuid")?,
        url: row.get("url")?,
        title: row.get("title")?,
        imported_at: row
            .get::<_, Option<i64>>("imported_at")?
            .map(|value| from_millis(value, "sources.imported_at"))
            .transpose()?,
        errors: Vec::new(),
    })
}
