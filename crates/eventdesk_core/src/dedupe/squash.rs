//! Squash of a confirmed duplicate group.
//!
//! # Responsibility
//! - Mark every non-canonical member as a duplicate of the canonical event.
//! - Keep `duplicate_of` free of chains by re-pointing references to losers.
//!
//! # Invariants
//! - Nothing changes unless the whole call succeeds.
//! - Losers are retained; only their `duplicate_of` column is written.
//! - Under [`MergePolicy::KeepCanonical`] the canonical event is not modified.
//! - Squashing an already-squashed set again changes nothing.

use crate::model::event::{normalize_tags, Event, EventId};
use crate::repo::event_repo::{EventRepository, RepoError, SqliteEventRepository};
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// What the canonical event absorbs from the losers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Canonical fields are left exactly as they were.
    #[default]
    KeepCanonical,
    /// Losers' tags are added to the canonical tag set.
    UnionTags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashUsage {
    EmptySet,
    CanonicalNotInSet(EventId),
    CanonicalIsDuplicate { canonical: EventId, of: EventId },
}

impl Display for SquashUsage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySet => write!(f, "no events given to squash"),
            Self::CanonicalNotInSet(id) => {
                write!(f, "canonical event {id} is not one of the events to squash")
            }
            Self::CanonicalIsDuplicate { canonical, of } => write!(
                f,
                "canonical event {canonical} is already a duplicate of {of}"
            ),
        }
    }
}

#[derive(Debug)]
pub enum SquashError {
    InvalidArgument(SquashUsage),
    /// An id no longer names a stored event.
    Stale(EventId),
    Repo(RepoError),
}

impl Display for SquashError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(usage) => write!(f, "{usage}"),
            Self::Stale(id) => write!(f, "event {id} no longer exists"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SquashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SquashError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::Stale(id),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for SquashError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Collapses `event_ids` onto `canonical_id` and returns the canonical event.
pub fn squash(
    conn: &mut Connection,
    event_ids: &[EventId],
    canonical_id: EventId,
    policy: MergePolicy,
) -> Result<Event, SquashError> {
    if event_ids.is_empty() {
        return Err(SquashError::InvalidArgument(SquashUsage::EmptySet));
    }
    if !event_ids.contains(&canonical_id) {
        return Err(SquashError::InvalidArgument(
            SquashUsage::CanonicalNotInSet(canonical_id),
        ));
    }

    let losers = event_ids
        .iter()
        .copied()
        .filter(|id| *id != canonical_id)
        .collect::<BTreeSet<_>>();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let (canonical, marked, repointed) = {
        let repo = SqliteEventRepository::new(&tx);
        let mut canonical = repo
            .get_event(canonical_id)?
            .ok_or(SquashError::Stale(canonical_id))?;
        if let Some(of) = canonical.duplicate_of {
            return Err(SquashError::InvalidArgument(
                SquashUsage::CanonicalIsDuplicate {
                    canonical: canonical_id,
                    of,
                },
            ));
        }

        let mut loser_events = Vec::with_capacity(losers.len());
        for id in &losers {
            loser_events.push(repo.get_event(*id)?.ok_or(SquashError::Stale(*id))?);
        }

        let mut marked = 0usize;
        let mut repointed = 0usize;
        for loser in &loser_events {
            repointed += repo.repoint_duplicates(loser.uuid, canonical_id)?;
            if loser.duplicate_of != Some(canonical_id) {
                repo.mark_duplicate(loser.uuid, canonical_id)?;
                marked += 1;
            }
        }

        if policy == MergePolicy::UnionTags {
            let mut tags = canonical.tags.clone();
            tags.extend(loser_events.iter().flat_map(|e| e.tags.iter().cloned()));
            let merged = normalize_tags(&tags);
            if merged != canonical.tags {
                canonical.tags = merged;
                repo.update_event(&canonical)?;
            }
        }

        (canonical, marked, repointed)
    };
    tx.commit()?;

    info!(
        "event=squash module=dedupe status=ok canonical_id={} members={} marked={} repointed={} policy={:?}",
        canonical.uuid,
        event_ids.len(),
        marked,
        repointed,
        policy
    );
    Ok(canonical)
}
