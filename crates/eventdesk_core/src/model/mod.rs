//! Domain model for imported event listings.
//!
//! # Responsibility
//! - Define canonical data structures used by import, dedupe and search.
//! - Own the validation rules every persisted record must satisfy.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Duplicate events are tombstoned through `duplicate_of`, never deleted.

pub mod event;
pub mod source;
pub mod venue;
