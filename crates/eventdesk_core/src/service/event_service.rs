//! Event use-case service.
//!
//! # Responsibility
//! - Event lookup with duplicate redirects.
//! - Hand-entered events: create, update, clone and delete.
//! - Administrative duplicate detection and squash.
//! - Search and date-based listings.
//!
//! # Invariants
//! - Domain failures come back as typed outcomes or messages; only storage
//!   faults are returned as `Err`.
//! - An edit and the venue it creates commit together.
//! - Edits never change an event's id, provenance or duplicate link.

use crate::config::CoreConfig;
use crate::dedupe::detector::{find_duplicates, DuplicateGroups};
use crate::dedupe::squash::{squash, SquashError};
use crate::dedupe::strategy::DuplicateError;
use crate::fetch::Candidate;
use crate::import::draft::{attach_venue, choose_venue, draft_event};
use crate::import::importer::SkipReason;
use crate::model::event::{Event, EventId};
use crate::model::venue::Venue;
use crate::repo::event_repo::{EventRepository, RepoError, RepoResult, SqliteEventRepository};
use crate::repo::venue_repo::{SqliteVenueRepository, VenueRepository};
use crate::search::date_range::{
    self, resolve_date_range, resolve_listing_order, DateFilter, DateRange,
};
use crate::search::fts::SearchError;
use crate::search::grouped::{search, GroupedEvents, SearchOrder, SearchRequest, SearchWarning};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

/// Event projection including its venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub venue: Option<Venue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowOutcome {
    Found(EventDetail),
    /// The event is a duplicate; show the canonical event instead.
    Redirect(EventId),
    NotFound(String),
}

/// Duplicate groups plus a message when the request could not be honored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateListing {
    pub groups: DuplicateGroups,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashOutcome {
    Squashed(Event),
    /// Invalid request or stale id; nothing changed.
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(GroupedEvents),
    /// Usage or query error; no groups were produced.
    Rejected(String),
}

/// Result of saving hand-entered event fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Saved {
        event: Event,
        /// Venue created from the given venue name.
        new_venue: Option<Venue>,
    },
    /// Fields did not describe a valid event; nothing changed.
    Rejected(String),
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    /// Unsaved fields prefilled from the original, without dates.
    Draft(Candidate),
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(Event),
    NotFound(String),
}

/// Upcoming events in the resolved order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventListing {
    pub order: SearchOrder,
    pub warnings: Vec<SearchWarning>,
    pub events: Vec<Event>,
}

/// Listing restricted to a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatedListing {
    pub range: DateRange,
    pub order: SearchOrder,
    pub warnings: Vec<SearchWarning>,
    pub events: Vec<Event>,
}

/// Use-case service for events.
pub struct EventService<'conn> {
    conn: &'conn mut Connection,
    config: &'conn CoreConfig,
}

impl<'conn> EventService<'conn> {
    pub fn new(conn: &'conn mut Connection, config: &'conn CoreConfig) -> Self {
        Self { conn, config }
    }

    /// Looks up one event, redirecting duplicates to their canonical event.
    pub fn show(&self, id: EventId) -> RepoResult<ShowOutcome> {
        let Some(event) = SqliteEventRepository::new(self.conn).get_event(id)? else {
            return Ok(ShowOutcome::NotFound(format!("Couldn't find event with id {id}")));
        };
        if let Some(canonical) = event.duplicate_of {
            return Ok(ShowOutcome::Redirect(canonical));
        }

        let venue = match event.venue_id {
            Some(venue_id) => SqliteVenueRepository::new(self.conn).get_venue(venue_id)?,
            None => None,
        };
        Ok(ShowOutcome::Found(EventDetail { event, venue }))
    }

    /// Venues an event can be attached to, by title.
    pub fn venues(&self) -> RepoResult<Vec<Venue>> {
        SqliteVenueRepository::new(self.conn).list_venues()
    }

    /// Saves a new hand-entered event.
    pub fn create(&mut self, fields: &Candidate) -> RepoResult<EditOutcome> {
        self.save(None, fields)
    }

    /// Replaces the editable fields of an existing event.
    pub fn update(&mut self, id: EventId, fields: &Candidate) -> RepoResult<EditOutcome> {
        self.save(Some(id), fields)
    }

    fn save(&mut self, id: Option<EventId>, fields: &Candidate) -> RepoResult<EditOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = {
            let events = SqliteEventRepository::new(&tx);
            let venues = SqliteVenueRepository::new(&tx);

            let existing = match id {
                Some(id) => match events.get_event(id)? {
                    Some(existing) => Some(existing),
                    None => {
                        return Ok(EditOutcome::NotFound(format!(
                            "Couldn't find event with id {id}"
                        )))
                    }
                },
                None => None,
            };

            let mut event =
                match draft_event(fields, self.config.import.default_duration_minutes) {
                    Ok(event) => event,
                    Err(reason) => return Ok(rejected(reason)),
                };
            let choice = match choose_venue(&venues, fields)? {
                Ok(choice) => choice,
                Err(reason) => return Ok(rejected(reason)),
            };

            if let Some(existing) = &existing {
                event.uuid = existing.uuid;
                event.source_id = existing.source_id;
                event.duplicate_of = existing.duplicate_of;
            }
            let new_venue = attach_venue(&venues, &mut event, choice, None)?;
            match existing {
                Some(_) => events.update_event(&event)?,
                None => {
                    events.create_event(&event)?;
                }
            }
            info!(
                "event=event_edit module=service status=ok event_id={} mode={} new_venue={}",
                event.uuid,
                if id.is_some() { "update" } else { "create" },
                new_venue.is_some()
            );
            EditOutcome::Saved { event, new_venue }
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Prefills fields for a new event from an existing one.
    ///
    /// Dates and provenance are left blank.
    pub fn clone_event(&self, id: EventId) -> RepoResult<CloneOutcome> {
        let Some(event) = SqliteEventRepository::new(self.conn).get_event(id)? else {
            return Ok(CloneOutcome::NotFound(format!("Couldn't find event with id {id}")));
        };
        Ok(CloneOutcome::Draft(Candidate {
            title: event.title,
            description: event.description,
            url: event.url,
            venue_id: event.venue_id.map(|venue_id| venue_id.to_string()),
            tags: event.tags,
            ..Candidate::default()
        }))
    }

    /// Deletes one event; its duplicates become regular events again.
    pub fn delete(&mut self, id: EventId) -> RepoResult<DeleteOutcome> {
        let repo = SqliteEventRepository::new(self.conn);
        let Some(event) = repo.get_event(id)? else {
            return Ok(DeleteOutcome::NotFound(format!("Couldn't find event with id {id}")));
        };
        repo.delete_event(id)?;
        info!(
            "event=event_delete module=service status=ok event_id={}",
            id
        );
        Ok(DeleteOutcome::Deleted(event))
    }

    /// Groups duplicates by the named comparison type.
    ///
    /// An unsupported type yields no groups and a message.
    pub fn find_duplicates_by_type(&self, kind: &str) -> RepoResult<DuplicateListing> {
        match find_duplicates(self.conn, kind) {
            Ok(groups) => Ok(DuplicateListing {
                groups,
                message: None,
            }),
            Err(err @ DuplicateError::InvalidArgument(_)) => {
                warn!(
                    "event=duplicates_find module=service status=rejected error={}",
                    err
                );
                Ok(DuplicateListing {
                    groups: DuplicateGroups::new(),
                    message: Some(err.to_string()),
                })
            }
            Err(DuplicateError::Repo(err)) => Err(err),
        }
    }

    /// Squashes `ids` onto `canonical_id` using the configured merge policy.
    pub fn squash_many(
        &mut self,
        ids: &[EventId],
        canonical_id: EventId,
    ) -> RepoResult<SquashOutcome> {
        match squash(self.conn, ids, canonical_id, self.config.squash.merge_policy) {
            Ok(canonical) => Ok(SquashOutcome::Squashed(canonical)),
            Err(SquashError::Repo(err)) => Err(err),
            Err(rejected) => {
                warn!(
                    "event=squash module=service status=rejected error={}",
                    rejected
                );
                Ok(SquashOutcome::Rejected(rejected.to_string()))
            }
        }
    }

    /// Keyword or tag search split into past and current events.
    pub fn search(
        &self,
        request: &SearchRequest,
        now: DateTime<Utc>,
    ) -> RepoResult<SearchOutcome> {
        match search(self.conn, request, now) {
            Ok(grouped) => Ok(SearchOutcome::Found(grouped)),
            Err(SearchError::Db(err)) => Err(RepoError::Db(err)),
            Err(SearchError::InvalidData(message)) => Err(RepoError::InvalidData(message)),
            Err(err @ (SearchError::Usage(_) | SearchError::InvalidQuery { .. })) => {
                Ok(SearchOutcome::Rejected(err.to_string()))
            }
        }
    }

    /// Non-duplicate events that have not finished before today.
    ///
    /// `order` accepts `date`, `name` or `venue`; anything else falls back
    /// to date with a warning.
    pub fn future(
        &self,
        order: Option<&str>,
        now: DateTime<Utc>,
    ) -> RepoResult<EventListing> {
        let (order, warnings) = resolve_listing_order(order);
        let events = date_range::future(self.conn, now, order)?;
        Ok(EventListing {
            order,
            warnings,
            events,
        })
    }

    /// Non-duplicate events within a leniently parsed date range.
    pub fn within_dates(
        &self,
        filter: Option<&DateFilter>,
        order: Option<&str>,
        now: DateTime<Utc>,
    ) -> RepoResult<DatedListing> {
        let range = resolve_date_range(
            filter,
            now.date_naive(),
            self.config.listing.default_range_months,
        );
        let (order, warnings) = resolve_listing_order(order);
        let events = date_range::within_dates(self.conn, &range, order)?;
        Ok(DatedListing {
            range,
            order,
            warnings,
            events,
        })
    }
}

fn rejected(reason: SkipReason) -> EditOutcome {
    warn!(
        "event=event_edit module=service status=rejected reason={}",
        reason.code()
    );
    EditOutcome::Rejected(reason.to_string())
}
