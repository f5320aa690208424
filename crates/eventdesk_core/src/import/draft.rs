//! Raw event fields to validated events.
//!
//! Shared by the importer and by hand-entered event edits, so both read
//! dates, default the end and resolve venues the same way.
//!
//! # Invariants
//! - Date arithmetic never overflows; out-of-range results are rejected as
//!   [`SkipReason::OutOfRange`].
//! - Venue resolution order: explicit id, then name (reused or created),
//!   then none.

use crate::fetch::Candidate;
use crate::import::datetime::combine;
use crate::import::importer::SkipReason;
use crate::model::event::{normalize_tags, Event};
use crate::model::source::SourceId;
use crate::model::venue::{Venue, VenueId};
use crate::repo::event_repo::RepoResult;
use crate::repo::venue_repo::VenueRepository;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Upper bound applied to the configured default duration (about 8000 years).
const MAX_DEFAULT_DURATION_MINUTES: i64 = u32::MAX as i64;

/// Venue decision for one set of event fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VenueChoice {
    None,
    Existing(VenueId),
    Create(String),
}

/// Builds an unsaved event without venue or provenance.
pub(crate) fn draft_event(
    candidate: &Candidate,
    default_duration_minutes: i64,
) -> Result<Event, SkipReason> {
    let title = candidate.title.trim();
    if title.is_empty() {
        return Err(SkipReason::MissingTitle);
    }

    let start = combine(
        candidate.start_date.as_deref(),
        candidate.start_time.as_deref(),
    )
    .map_err(SkipReason::InvalidStart)?;
    let end = resolve_end(candidate, start, default_duration_minutes)?;

    let mut event = Event::new(title, start);
    event.description = candidate.description.clone();
    event.url = candidate.url.clone();
    event.end_time = Some(end);
    event.tags = normalize_tags(&candidate.tags);
    event.validate().map_err(SkipReason::Invalid)?;
    Ok(event)
}

/// Resolves the end time, falling back to start plus the default duration.
///
/// An end given only as a time that lands before the start is read as
/// running past midnight.
pub(crate) fn resolve_end(
    candidate: &Candidate,
    start: DateTime<Utc>,
    default_duration_minutes: i64,
) -> Result<DateTime<Utc>, SkipReason> {
    let has_end_date = has_text(candidate.end_date.as_deref());
    let has_end_time = has_text(candidate.end_time.as_deref());

    let end = if !has_end_date && !has_end_time {
        None
    } else {
        let end_date = if has_end_date {
            candidate.end_date.as_deref()
        } else {
            candidate.start_date.as_deref()
        };
        combine(end_date, candidate.end_time.as_deref()).ok()
    };

    let Some(end) = end else {
        return start
            .checked_add_signed(Duration::minutes(
                default_duration_minutes.clamp(0, MAX_DEFAULT_DURATION_MINUTES),
            ))
            .ok_or(SkipReason::OutOfRange);
    };

    if end >= start {
        Ok(end)
    } else if !has_end_date {
        end.checked_add_signed(Duration::days(1))
            .ok_or(SkipReason::OutOfRange)
    } else {
        Err(SkipReason::EndBeforeStart)
    }
}

pub(crate) fn choose_venue(
    venues: &impl VenueRepository,
    candidate: &Candidate,
) -> RepoResult<Result<VenueChoice, SkipReason>> {
    if let Some(raw_id) = trimmed(candidate.venue_id.as_deref()) {
        let Ok(id) = Uuid::parse_str(raw_id) else {
            return Ok(Err(SkipReason::UnknownVenue(raw_id.to_string())));
        };
        return Ok(match venues.get_venue(id)? {
            Some(venue) => Ok(VenueChoice::Existing(venue.uuid)),
            None => Err(SkipReason::UnknownVenue(raw_id.to_string())),
        });
    }

    let Some(name) = trimmed(candidate.venue_name.as_deref()) else {
        return Ok(Ok(VenueChoice::None));
    };

    Ok(Ok(match venues.find_by_title(name)? {
        Some(venue) => VenueChoice::Existing(venue.uuid),
        None => VenueChoice::Create(name.to_string()),
    }))
}

/// Points `event` at the chosen venue, creating it when needed.
///
/// Returns the venue when one was created.
pub(crate) fn attach_venue(
    venues: &impl VenueRepository,
    event: &mut Event,
    choice: VenueChoice,
    source_id: Option<SourceId>,
) -> RepoResult<Option<Venue>> {
    match choice {
        VenueChoice::None => {
            event.venue_id = None;
            Ok(None)
        }
        VenueChoice::Existing(id) => {
            event.venue_id = Some(id);
            Ok(None)
        }
        VenueChoice::Create(name) => {
            let mut venue = Venue::new(name);
            venue.source_id = source_id;
            venues.create_venue(&venue)?;
            event.venue_id = Some(venue.uuid);
            Ok(Some(venue))
        }
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|text| !text.trim().is_empty())
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}
