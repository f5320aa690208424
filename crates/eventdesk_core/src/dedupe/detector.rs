//! Duplicate detection over persisted events.

use crate::dedupe::strategy::{DuplicateError, DuplicateStrategy};
use crate::model::event::Event;
use crate::repo::event_repo::{
    EventListOrder, EventListQuery, EventRepository, SqliteEventRepository,
};
use log::info;
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Group key mapped to its members in insertion order.
pub type DuplicateGroups = BTreeMap<String, Vec<Event>>;

/// Groups non-duplicate events sharing a key under the strategy named `kind`.
///
/// Only groups with two or more members are returned. Keys are sorted and
/// members keep insertion order, so the result is stable for a dataset.
pub fn find_duplicates(conn: &Connection, kind: &str) -> Result<DuplicateGroups, DuplicateError> {
    let strategy = DuplicateStrategy::parse(kind)?;
    let events = SqliteEventRepository::new(conn).list_events(&EventListQuery {
        order: EventListOrder::Insertion,
        ..EventListQuery::default()
    })?;
    let scanned = events.len();

    let groups = group_events(strategy, events);
    info!(
        "event=duplicates_find module=dedupe status=ok strategy={} scanned={} groups={}",
        strategy.name(),
        scanned,
        groups.len()
    );
    Ok(groups)
}

/// Groups already-loaded events; input order becomes member order.
pub fn group_events(strategy: DuplicateStrategy, events: Vec<Event>) -> DuplicateGroups {
    let mut groups: DuplicateGroups = BTreeMap::new();
    for event in events {
        if event.is_duplicate() {
            continue;
        }
        if let Some(key) = strategy.key(&event) {
            groups.entry(key).or_default().push(event);
        }
    }
    groups.retain(|_, members| members.len() >= 2);
    groups
}
