//! Core domain logic for EventDesk.
//! Ingests event sources, deduplicates events and serves searchable listings.

pub mod config;
pub mod db;
pub mod dedupe;
pub mod fetch;
pub mod import;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use dedupe::detector::{find_duplicates, DuplicateGroups};
pub use dedupe::squash::{squash, MergePolicy, SquashError};
pub use dedupe::strategy::{DuplicateError, DuplicateStrategy};
pub use fetch::http::HttpSourceFetcher;
pub use fetch::{Candidate, FetchError, SourceFetcher};
pub use import::classify::{classify, ImportFailure, ImportFailureKind};
pub use import::importer::{EventImporter, ImportOutcome, ImportReport, SkipReason};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::event::{Event, EventId};
pub use model::source::{Source, SourceId};
pub use model::venue::{Venue, VenueId};
pub use repo::event_repo::{RepoError, RepoResult};
pub use search::date_range::{DateFilter, DateRange};
pub use search::fts::{SearchError, SearchResult};
pub use search::grouped::{search, GroupedEvents, SearchOrder, SearchRequest};
pub use service::event_service::{CloneOutcome, DeleteOutcome, EditOutcome, EventService};
pub use service::source_service::{ImportSummary, SourceService, SourceUpdate};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
