#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use eventdesk_core::fetch::{Candidate, FetchError, SourceFetcher};
use eventdesk_core::model::event::Event;
use eventdesk_core::repo::event_repo::{EventRepository, SqliteEventRepository};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};

type Script = Box<dyn Fn() -> Result<Vec<Candidate>, FetchError> + Send + Sync>;

/// In-process fetcher replaying a fixed answer and counting calls.
pub struct ScriptedFetcher {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn candidates(candidates: Vec<Candidate>) -> Self {
        Self::new(move || Ok(candidates.clone()))
    }

    pub fn failing(make_error: impl Fn() -> FetchError + Send + Sync + 'static) -> Self {
        Self::new(move || Err(make_error()))
    }

    fn new(
        script: impl Fn() -> Result<Vec<Candidate>, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SourceFetcher for ScriptedFetcher {
    fn fetch(&self, _origin: &str) -> Result<Vec<Candidate>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)()
    }
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// Fixed "now" shared by tests.
pub fn now() -> DateTime<Utc> {
    at(2026, 10, 16, 12, 0)
}

pub fn insert_event(conn: &Connection, title: &str, start: DateTime<Utc>) -> Event {
    let event = Event::new(title, start);
    SqliteEventRepository::new(conn).create_event(&event).unwrap();
    event
}

pub fn save(conn: &Connection, event: &Event) {
    SqliteEventRepository::new(conn).create_event(event).unwrap();
}

pub fn reload(conn: &Connection, event: &Event) -> Event {
    SqliteEventRepository::new(conn)
        .get_event(event.uuid)
        .unwrap()
        .unwrap()
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}
