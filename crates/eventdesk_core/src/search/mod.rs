//! Search and listing entry points.
//!
//! # Responsibility
//! - Keyword search backed by the SQLite FTS5 index over events.
//! - Tag search and past/current grouping of results.
//! - Lenient date-range filters for listings.
//!
//! # Invariants
//! - Events marked as duplicates never appear in any result.

pub mod date_range;
pub mod fts;
pub mod grouped;
