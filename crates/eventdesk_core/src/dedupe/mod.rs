//! Duplicate detection and squash.
//!
//! # Responsibility
//! - Group non-duplicate events by a comparison strategy.
//! - Collapse an operator-confirmed group onto one canonical event.
//!
//! # Invariants
//! - Detection is read-only and deterministic for a given dataset.
//! - `duplicate_of` never forms chains after a squash.

pub mod detector;
pub mod squash;
pub mod strategy;
