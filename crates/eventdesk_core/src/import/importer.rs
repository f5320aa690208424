//! Event importer.
//!
//! # Responsibility
//! - Validate a source, fetch it, and classify any fetch failure onto it.
//! - Persist valid candidates as events with venue and provenance.
//!
//! # Invariants
//! - A fetch failure leaves `events == None`; a fetch whose candidates were
//!   all skipped leaves `events == Some(vec![])`.
//! - Candidate validation happens before any write for that candidate.
//! - The batch, including venue creation, commits or rolls back as a unit.
//! - Re-importing a source reuses events it already produced.
//! - Duplicates hidden by a squash never reappear in a report; the event
//!   they were squashed onto is listed instead.

use crate::config::ImportConfig;
use crate::fetch::{Candidate, SourceFetcher};
use crate::import::classify::{classify, FetchFailure, ImportFailure};
use crate::import::datetime::DateTimeError;
use crate::import::draft::{attach_venue, choose_venue, draft_event};
use crate::model::event::{Event, EventValidationError};
use crate::model::source::{normalize_origin, Source, SourceError, SourceValidationError};
use crate::model::venue::Venue;
use crate::repo::event_repo::{EventRepository, RepoResult, SqliteEventRepository};
use crate::repo::source_repo::{SourceRepository, SqliteSourceRepository};
use crate::repo::venue_repo::SqliteVenueRepository;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Final state of one import attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Source reference failed validation; nothing was fetched.
    Invalid(SourceValidationError),
    /// Fetch failed; the classified failure is also recorded on the source.
    Failed(ImportFailure),
    Success,
}

/// Why one candidate was not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    InvalidStart(DateTimeError),
    EndBeforeStart,
    /// Start or end falls outside the representable calendar.
    OutOfRange,
    UnknownVenue(String),
    Past,
    Invalid(EventValidationError),
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingTitle => "missing_title",
            Self::InvalidStart(_) => "invalid_start",
            Self::EndBeforeStart => "end_before_start",
            Self::OutOfRange => "out_of_range",
            Self::UnknownVenue(_) => "unknown_venue",
            Self::Past => "past",
            Self::Invalid(_) => "invalid",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "title is missing"),
            Self::InvalidStart(err) => write!(f, "start time unusable: {err}"),
            Self::EndBeforeStart => write!(f, "end is earlier than start"),
            Self::OutOfRange => write!(f, "date is outside the supported range"),
            Self::UnknownVenue(id) => write!(f, "venue `{id}` does not exist"),
            Self::Past => write!(f, "event already ended"),
            Self::Invalid(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    /// Position of the candidate in the fetched sequence.
    pub index: usize,
    pub reason: SkipReason,
}

/// Everything an import attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub outcome: ImportOutcome,
    /// `None` when candidates were never obtained.
    pub events: Option<Vec<Event>>,
    /// Venues created as a side effect, in creation order.
    pub created_venues: Vec<Venue>,
    /// Events inserted by this attempt.
    pub created: usize,
    /// Candidates matched to events from an earlier import of the same source.
    pub reused: usize,
    pub skipped: Vec<SkippedCandidate>,
}

impl ImportReport {
    fn without_events(outcome: ImportOutcome) -> Self {
        Self {
            outcome,
            events: None,
            created_venues: Vec::new(),
            created: 0,
            reused: 0,
            skipped: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ImportOutcome::Success)
    }

    pub fn event_count(&self) -> usize {
        self.events.as_ref().map_or(0, Vec::len)
    }
}

/// Imports sources through a [`SourceFetcher`].
pub struct EventImporter<'a> {
    fetcher: &'a dyn SourceFetcher,
    config: &'a ImportConfig,
}

impl<'a> EventImporter<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, config: &'a ImportConfig) -> Self {
        Self { fetcher, config }
    }

    /// Runs one import attempt for `source`.
    ///
    /// Domain failures are returned inside the report and recorded on
    /// `source.errors`; only storage faults surface as `Err`. An unsaved
    /// source whose origin is already registered takes over the registered
    /// identity; otherwise it is saved with the batch.
    pub fn import(
        &self,
        conn: &mut Connection,
        source: &mut Source,
        now: DateTime<Utc>,
    ) -> RepoResult<ImportReport> {
        let started_at = Instant::now();
        source.clear_errors();

        match normalize_origin(&source.url) {
            Ok(url) => source.url = url,
            Err(err) => {
                warn!(
                    "event=source_import module=import status=invalid source_id={} error={}",
                    source.uuid, err
                );
                source.record_error(SourceError::Invalid(err.clone()));
                return Ok(ImportReport::without_events(ImportOutcome::Invalid(err)));
            }
        }
        adopt_registered(conn, source)?;

        let fetched = self.fetcher.fetch(&source.url);
        let candidates = match &fetched {
            Ok(candidates) if !candidates.is_empty() => candidates,
            Ok(_) => return Ok(self.fail(source, FetchFailure::NoCandidates, started_at)),
            Err(err) => return Ok(self.fail(source, FetchFailure::Error(err), started_at)),
        };

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = {
            let sources = SqliteSourceRepository::new(&tx);
            if sources.get_source(source.uuid)?.is_none() {
                sources.create_source(source)?;
            }

            let report = self.persist_candidates(&tx, source, candidates, now)?;
            sources.mark_imported(source.uuid, now)?;
            report
        };
        tx.commit()?;
        source.imported_at = Some(now);

        info!(
            "event=source_import module=import status=ok source_id={} candidates={} created={} reused={} skipped={} new_venues={} duration_ms={}",
            source.uuid,
            candidates.len(),
            report.created,
            report.reused,
            report.skipped.len(),
            report.created_venues.len(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn fail(
        &self,
        source: &mut Source,
        failure: FetchFailure<'_>,
        started_at: Instant,
    ) -> ImportReport {
        let classified = classify(failure);
        warn!(
            "event=source_import module=import status=error source_id={} error_code={} duration_ms={} cause={}",
            source.uuid,
            classified.kind.code(),
            started_at.elapsed().as_millis(),
            classified.cause.as_deref().unwrap_or("-")
        );
        source.record_error(SourceError::Import(classified.clone()));
        ImportReport::without_events(ImportOutcome::Failed(classified))
    }

    fn persist_candidates(
        &self,
        conn: &Connection,
        source: &Source,
        candidates: &[Candidate],
        now: DateTime<Utc>,
    ) -> RepoResult<ImportReport> {
        let events_repo = SqliteEventRepository::new(conn);
        let venues_repo = SqliteVenueRepository::new(conn);
        let mut report = ImportReport {
            outcome: ImportOutcome::Success,
            events: Some(Vec::new()),
            created_venues: Vec::new(),
            created: 0,
            reused: 0,
            skipped: Vec::new(),
        };
        let mut persisted: Vec<Event> = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            if let Some(tzid) = candidate.time_zone.as_deref() {
                warn!(
                    "event=candidate_time_zone module=import status=assumed_utc source_id={} index={} tzid={}",
                    source.uuid, index, tzid
                );
            }

            let mut event = match self.build_event(candidate, source, now) {
                Ok(event) => event,
                Err(reason) => {
                    skip(&mut report, source, index, reason);
                    continue;
                }
            };

            if let Some(existing) =
                events_repo.find_imported(source.uuid, &event.title, event.start_time)?
            {
                report.reused += 1;
                let listed = match existing.duplicate_of {
                    None => Some(existing),
                    Some(canonical_id) => {
                        info!(
                            "event=candidate_reuse module=import status=duplicate source_id={} index={} canonical_id={}",
                            source.uuid, index, canonical_id
                        );
                        events_repo.get_event(canonical_id)?
                    }
                };
                if let Some(listed) = listed {
                    if !persisted.iter().any(|event| event.uuid == listed.uuid) {
                        persisted.push(listed);
                    }
                }
                continue;
            }

            let choice = match choose_venue(&venues_repo, candidate)? {
                Ok(choice) => choice,
                Err(reason) => {
                    skip(&mut report, source, index, reason);
                    continue;
                }
            };
            if let Some(venue) =
                attach_venue(&venues_repo, &mut event, choice, Some(source.uuid))?
            {
                report.created_venues.push(venue);
            }

            events_repo.create_event(&event)?;
            report.created += 1;
            persisted.push(event);
        }

        report.events = Some(persisted);
        Ok(report)
    }

    /// Validates one candidate into an unsaved event without a venue.
    fn build_event(
        &self,
        candidate: &Candidate,
        source: &Source,
        now: DateTime<Utc>,
    ) -> Result<Event, SkipReason> {
        let mut event = draft_event(candidate, self.config.default_duration_minutes)?;
        if self.config.skip_past_events && event.is_past(now) {
            return Err(SkipReason::Past);
        }
        event.source_id = Some(source.uuid);
        Ok(event)
    }
}

/// Takes over the identity of a registered source with the same origin.
fn adopt_registered(conn: &Connection, source: &mut Source) -> RepoResult<()> {
    let repo = SqliteSourceRepository::new(conn);
    if repo.get_source(source.uuid)?.is_some() {
        return Ok(());
    }
    let Some(stored) = repo.find_by_url(&source.url)? else {
        return Ok(());
    };

    info!(
        "event=source_import module=import status=adopted source_id={} registered_id={}",
        source.uuid, stored.uuid
    );
    source.uuid = stored.uuid;
    source.imported_at = stored.imported_at;
    if source.title.is_none() {
        source.title = stored.title;
    }
    Ok(())
}

fn skip(report: &mut ImportReport, source: &Source, index: usize, reason: SkipReason) {
    info!(
        "event=candidate_skip module=import status=skip source_id={} index={} reason={}",
        source.uuid,
        index,
        reason.code()
    );
    report.skipped.push(SkippedCandidate { index, reason });
}
