//! Event domain model.
//!
//! # Responsibility
//! - Define the persisted event record and its validation rules.
//! - Provide the tag normalization contract shared by import and search.
//!
//! # Invariants
//! - `title` is never blank.
//! - `end_time` is never earlier than `start_time` when set.
//! - `duplicate_of`, when set, names a different event that is itself not a
//!   duplicate. Only the squash path writes this field.

use crate::model::source::SourceId;
use crate::model::venue::VenueId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an event.
pub type EventId = Uuid;

/// Canonical persisted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub uuid: EventId,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Normalized (lowercase, trimmed), deduplicated and sorted.
    pub tags: Vec<String>,
    pub venue_id: Option<VenueId>,
    /// Provenance. `None` for events entered by hand.
    pub source_id: Option<SourceId>,
    pub duplicate_of: Option<EventId>,
}

impl Event {
    /// Creates an event with a generated id and no optional fields.
    pub fn new(title: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            description: None,
            url: None,
            start_time,
            end_time: None,
            tags: Vec::new(),
            venue_id: None,
            source_id: None,
            duplicate_of: None,
        }
    }

    /// Validates field-level invariants.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.title.trim().is_empty() {
            return Err(EventValidationError::BlankTitle);
        }
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(EventValidationError::EndBeforeStart {
                    start: self.start_time,
                    end,
                });
            }
        }
        if self.duplicate_of == Some(self.uuid) {
            return Err(EventValidationError::SelfDuplicate(self.uuid));
        }
        Ok(())
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    /// End time, or start time for events without one.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or(self.start_time)
    }

    /// Whether the event finished before `now`.
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.effective_end() < now
    }
}

/// Field-level validation failure for [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    BlankTitle,
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    SelfDuplicate(EventId),
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "event title cannot be blank"),
            Self::EndBeforeStart { start, end } => {
                write!(f, "event end {end} is earlier than start {start}")
            }
            Self::SelfDuplicate(id) => write!(f, "event {id} cannot be a duplicate of itself"),
        }
    }
}

impl Error for EventValidationError {}

/// Normalizes one tag value: trimmed and lowercased, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    tags.iter()
        .filter_map(|tag| normalize_tag(tag.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
