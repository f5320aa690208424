//! Source import pipeline.
//!
//! # Responsibility
//! - Classify fetch failures into user-facing import categories.
//! - Turn fetched candidates into persisted events with venues and provenance.
//!
//! # Invariants
//! - An import attempt attaches at most one error to its source.
//! - A batch is persisted atomically; skipped candidates never leave venues
//!   or events behind.

pub mod classify;
pub mod datetime;
pub(crate) mod draft;
pub mod importer;
