//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate import, dedupe and search into boundary operations.
//! - Keep callers (CLI, request layers) decoupled from storage details.

pub mod event_service;
pub mod source_service;
