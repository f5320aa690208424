//! Source domain model.
//!
//! # Responsibility
//! - Define the operator-managed origin of imported events.
//! - Normalize and validate origin references before any network access.
//!
//! # Invariants
//! - A persisted `url` is always normalized by [`normalize_origin`].
//! - `errors` is transient: it describes the latest import attempt only and
//!   holds at most one classified import failure.

use crate::import::classify::ImportFailure;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SourceId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uuid: SourceId,
    /// Normalized origin reference.
    pub url: String,
    pub title: Option<String>,
    /// Time of the last import that reached the persistence step.
    pub imported_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub errors: Vec<SourceError>,
}

impl Source {
    /// Creates an unsaved source from a raw origin reference.
    pub fn new(origin: &str) -> Result<Self, SourceValidationError> {
        Ok(Self {
            uuid: Uuid::new_v4(),
            url: normalize_origin(origin)?,
            title: None,
            imported_at: None,
            errors: Vec::new(),
        })
    }

    /// Re-validates the stored origin reference.
    ///
    /// Sources loaded from storage or edited in place go through this check
    /// again before an import is attempted.
    pub fn validate(&self) -> Result<(), SourceValidationError> {
        normalize_origin(&self.url).map(|_| ())
    }

    /// Replaces any previous error with `error`.
    pub fn record_error(&mut self, error: SourceError) {
        self.errors.clear();
        self.errors.push(error);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Human-readable error sentence for display next to the source.
    pub fn error_sentence(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Validation-style error attached to a [`Source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    Invalid(SourceValidationError),
    Import(ImportFailure),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Import(failure) => write!(f, "{failure}"),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Import(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceValidationError {
    Blank,
    Malformed { origin: String, message: String },
    UnsupportedScheme(String),
    MissingHost(String),
}

impl Display for SourceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "source url cannot be blank"),
            Self::Malformed { origin, message } => {
                write!(f, "source url `{origin}` is malformed: {message}")
            }
            Self::UnsupportedScheme(scheme) => {
                write!(f, "source url scheme `{scheme}` is not supported")
            }
            Self::MissingHost(origin) => write!(f, "source url `{origin}` has no host"),
        }
    }
}

impl Error for SourceValidationError {}

/// Normalizes a raw origin reference into a fetchable URL.
///
/// Rules:
/// - surrounding whitespace is trimmed
/// - a reference without a scheme gets `http://`
/// - `webcal://` is rewritten to `http://`
/// - only `http`/`https` with a non-empty host are accepted
pub fn normalize_origin(raw: &str) -> Result<String, SourceValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SourceValidationError::Blank);
    }

    let with_scheme = if let Some(rest) = trimmed.strip_prefix("webcal://") {
        format!("http://{rest}")
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&with_scheme).map_err(|err| SourceValidationError::Malformed {
        origin: trimmed.to_string(),
        message: err.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SourceValidationError::UnsupportedScheme(
            url.scheme().to_string(),
        ));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url.to_string()),
        _ => Err(SourceValidationError::MissingHost(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_origin, SourceValidationError};

    #[test]
    fn origin_without_scheme_gets_http() {
        assert_eq!(
            normalize_origin("  example.com/events.ics ").unwrap(),
            "http://example.com/events.ics"
        );
    }

    #[test]
    fn webcal_is_rewritten_to_http() {
        assert_eq!(
            normalize_origin("webcal://cal.example.org/feed").unwrap(),
            "http://cal.example.org/feed"
        );
    }

    #[test]
    fn unsupported_and_blank_origins_are_rejected() {
        assert_eq!(normalize_origin("  "), Err(SourceValidationError::Blank));
        assert!(matches!(
            normalize_origin("ftp://example.com/x"),
            Err(SourceValidationError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
        assert!(matches!(
            normalize_origin("http://exa mple.com"),
            Err(SourceValidationError::Malformed { .. })
        ));
    }
}
