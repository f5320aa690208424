//! Source use-case service.
//!
//! # Responsibility
//! - Find or register sources by origin reference.
//! - Run imports and shape their outcome into a displayable summary.
//! - Provide source administration (show, list, update, delete).
//!
//! # Invariants
//! - Registration is idempotent by normalized origin reference.
//! - Invalid origins are never persisted; they come back as unsaved sources
//!   carrying the validation error.
//! - Only storage faults are returned as `Err`.

use crate::config::{ImportConfig, ListingConfig};
use crate::fetch::SourceFetcher;
use crate::import::importer::{EventImporter, ImportReport};
use crate::model::source::{normalize_origin, Source, SourceError, SourceId};
use crate::repo::event_repo::RepoResult;
use crate::repo::source_repo::{SourceRepository, SqliteSourceRepository};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

/// User-facing digest of one import attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportSummary {
    Imported {
        count: usize,
        /// First titles, capped by the listing summary limit.
        titles: Vec<String>,
        /// Events imported but not listed in `titles`.
        more: usize,
        new_venues: usize,
    },
    Failed {
        message: String,
    },
}

impl ImportSummary {
    pub fn from_report(report: &ImportReport, source: &Source, limit: usize) -> Self {
        match report.events.as_deref() {
            Some(events) if report.is_success() && !events.is_empty() => Self::Imported {
                count: events.len(),
                titles: events
                    .iter()
                    .take(limit)
                    .map(|event| event.title.clone())
                    .collect(),
                more: events.len().saturating_sub(limit),
                new_venues: report.created_venues.len(),
            },
            Some(_) => Self::Failed {
                message: "Unable to find any upcoming events to import from this source"
                    .to_string(),
            },
            None => Self::Failed {
                message: format!("Unable to import: {}", source.error_sentence()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Imported { .. })
    }

    /// Renders the summary as display lines.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Imported {
                count,
                titles,
                more,
                ..
            } => {
                let noun = if *count == 1 { "entry" } else { "entries" };
                let mut lines = vec![format!("Imported {count} {noun}:")];
                lines.extend(titles.iter().map(|title| format!("- {title}")));
                if *more > 0 {
                    lines.push(format!("+{more} more"));
                }
                lines
            }
            Self::Failed { message } => vec![message.clone()],
        }
    }
}

/// Import attempt result as handed to callers.
#[derive(Debug, Clone)]
pub struct SourceImport {
    pub source: Source,
    pub report: ImportReport,
    pub summary: ImportSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUpdate {
    Updated(Source),
    /// Invalid origin, or one already registered by another source.
    Rejected(String),
    NotFound(String),
}

/// Use-case service for sources.
pub struct SourceService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SourceService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Returns the stored source for `origin`, registering it when new.
    ///
    /// # Contract
    /// - Lookups use the normalized origin, so equivalent spellings match.
    /// - An invalid origin yields an unsaved source whose `errors` holds the
    ///   validation failure.
    pub fn create_or_find_source(&self, origin: &str) -> RepoResult<Source> {
        let normalized = match normalize_origin(origin) {
            Ok(url) => url,
            Err(err) => {
                let mut source = Source {
                    uuid: Uuid::new_v4(),
                    url: origin.trim().to_string(),
                    title: None,
                    imported_at: None,
                    errors: Vec::new(),
                };
                source.record_error(SourceError::Invalid(err));
                return Ok(source);
            }
        };

        let repo = SqliteSourceRepository::new(self.conn);
        if let Some(existing) = repo.find_by_url(&normalized)? {
            return Ok(existing);
        }

        let source = Source::new(&normalized)?;
        repo.create_source(&source)?;
        Ok(source)
    }

    /// Imports events for the source registered at `origin`.
    pub fn import_origin(
        &mut self,
        origin: &str,
        fetcher: &dyn SourceFetcher,
        import: &ImportConfig,
        listing: &ListingConfig,
        now: DateTime<Utc>,
    ) -> RepoResult<SourceImport> {
        let source = self.create_or_find_source(origin)?;
        self.import(source, fetcher, import, listing, now)
    }

    /// Runs one import of `source` and summarizes it.
    ///
    /// The source is re-validated first, so an unsaved invalid source comes
    /// back as an `Invalid` outcome without any fetch.
    pub fn import(
        &mut self,
        mut source: Source,
        fetcher: &dyn SourceFetcher,
        import: &ImportConfig,
        listing: &ListingConfig,
        now: DateTime<Utc>,
    ) -> RepoResult<SourceImport> {
        let report = EventImporter::new(fetcher, import).import(self.conn, &mut source, now)?;
        let summary = ImportSummary::from_report(&report, &source, listing.summary_limit);
        Ok(SourceImport {
            source,
            report,
            summary,
        })
    }

    pub fn show(&self, id: SourceId) -> RepoResult<Option<Source>> {
        SqliteSourceRepository::new(self.conn).get_source(id)
    }

    pub fn list(&self) -> RepoResult<Vec<Source>> {
        SqliteSourceRepository::new(self.conn).list_sources()
    }

    /// Changes the origin and title of a registered source.
    ///
    /// A blank title clears it. The import timestamp is kept.
    pub fn update(
        &self,
        id: SourceId,
        origin: &str,
        title: Option<&str>,
    ) -> RepoResult<SourceUpdate> {
        let repo = SqliteSourceRepository::new(self.conn);
        let Some(mut source) = repo.get_source(id)? else {
            return Ok(SourceUpdate::NotFound(format!("Couldn't find source with id {id}")));
        };

        let url = match normalize_origin(origin) {
            Ok(url) => url,
            Err(err) => return Ok(SourceUpdate::Rejected(err.to_string())),
        };
        if let Some(other) = repo.find_by_url(&url)? {
            if other.uuid != id {
                warn!(
                    "event=source_update module=service status=rejected source_id={} conflict_id={}",
                    id, other.uuid
                );
                return Ok(SourceUpdate::Rejected(format!(
                    "{url} is already registered as source {}",
                    other.uuid
                )));
            }
        }

        source.url = url;
        source.title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string);
        repo.update_source(&source)?;
        info!(
            "event=source_update module=service status=ok source_id={}",
            id
        );
        Ok(SourceUpdate::Updated(source))
    }

    /// Deletes a source; its events remain without provenance.
    pub fn delete(&self, id: SourceId) -> RepoResult<()> {
        SqliteSourceRepository::new(self.conn).delete_source(id)
    }
}
