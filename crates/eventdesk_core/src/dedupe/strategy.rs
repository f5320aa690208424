//! Comparison strategies for duplicate detection.
//!
//! Strategies form a closed set resolved by name through [`STRATEGY_TABLE`].
//! Each one derives an optional grouping key from an event; events without a
//! key never join a group.

use crate::model::event::Event;
use crate::repo::event_repo::RepoError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const KEY_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuplicateStrategy {
    /// Normalized title only.
    Title,
    /// Normalized title, venue and start date.
    TitleVenueDate,
    /// Normalized title and exact start time.
    TitleStart,
    Url,
    /// Venue and exact start time.
    VenueStart,
    /// Normalized description.
    Description,
}

const STRATEGY_TABLE: &[(&str, DuplicateStrategy)] = &[
    ("title", DuplicateStrategy::Title),
    ("title_venue_date", DuplicateStrategy::TitleVenueDate),
    ("title_start", DuplicateStrategy::TitleStart),
    ("url", DuplicateStrategy::Url),
    ("venue_start", DuplicateStrategy::VenueStart),
    ("description", DuplicateStrategy::Description),
];

#[derive(Debug)]
pub enum DuplicateError {
    /// Comparison type is not one of the known strategy names.
    InvalidArgument(String),
    Repo(RepoError),
}

impl Display for DuplicateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(name) => write!(
                f,
                "unsupported duplicate type `{name}`; expected one of: {}",
                DuplicateStrategy::names().join(", ")
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DuplicateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidArgument(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for DuplicateError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl DuplicateStrategy {
    /// Resolves a strategy by name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Result<Self, DuplicateError> {
        let wanted = name.trim().to_ascii_lowercase();
        STRATEGY_TABLE
            .iter()
            .find(|(known, _)| *known == wanted)
            .map(|(_, strategy)| *strategy)
            .ok_or_else(|| DuplicateError::InvalidArgument(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        STRATEGY_TABLE
            .iter()
            .find(|(_, strategy)| *strategy == self)
            .map_or("unknown", |(name, _)| name)
    }

    pub fn names() -> Vec<&'static str> {
        STRATEGY_TABLE.iter().map(|(name, _)| *name).collect()
    }

    /// Grouping key of `event`, `None` when a required field is missing.
    pub fn key(self, event: &Event) -> Option<String> {
        let parts = match self {
            Self::Title => vec![normalize_text(&event.title)?],
            Self::TitleVenueDate => vec![
                normalize_text(&event.title)?,
                event.venue_id?.to_string(),
                event.start_time.date_naive().to_string(),
            ],
            Self::TitleStart => vec![
                normalize_text(&event.title)?,
                event.start_time.to_rfc3339(),
            ],
            Self::Url => vec![event.url.as_deref().and_then(normalize_url)?],
            Self::VenueStart => vec![
                event.venue_id?.to_string(),
                event.start_time.to_rfc3339(),
            ],
            Self::Description => vec![event.description.as_deref().and_then(normalize_text)?],
        };
        Some(parts.join(KEY_SEPARATOR))
    }
}

/// Trims, lowercases and collapses inner whitespace. Blank text has no key.
pub fn normalize_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(WHITESPACE_RE.replace_all(&trimmed.to_lowercase(), " ").into_owned())
}

fn normalize_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_text, DuplicateError, DuplicateStrategy};
    use crate::model::event::Event;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn event(title: &str) -> Event {
        Event::new(title, Utc.with_ymd_and_hms(2026, 10, 20, 19, 0, 0).unwrap())
    }

    #[test]
    fn parse_accepts_known_names_only() {
        assert_eq!(
            DuplicateStrategy::parse(" Title_Venue_Date ").unwrap(),
            DuplicateStrategy::TitleVenueDate
        );
        assert!(matches!(
            DuplicateStrategy::parse("fuzzy"),
            Err(DuplicateError::InvalidArgument(name)) if name == "fuzzy"
        ));
        for name in DuplicateStrategy::names() {
            assert_eq!(DuplicateStrategy::parse(name).unwrap().name(), name);
        }
    }

    #[test]
    fn title_key_collapses_case_and_whitespace() {
        assert_eq!(
            DuplicateStrategy::Title.key(&event("  Jazz   NIGHT\t")),
            Some("jazz night".to_string())
        );
        assert_eq!(normalize_text("   "), None);
    }

    #[test]
    fn venue_strategies_need_a_venue() {
        let mut without_venue = event("Jazz night");
        assert_eq!(DuplicateStrategy::TitleVenueDate.key(&without_venue), None);
        assert_eq!(DuplicateStrategy::VenueStart.key(&without_venue), None);

        let venue = Uuid::new_v4();
        without_venue.venue_id = Some(venue);
        assert_eq!(
            DuplicateStrategy::TitleVenueDate.key(&without_venue),
            Some(format!("jazz night | {venue} | 2026-10-20"))
        );
    }

    #[test]
    fn url_key_ignores_trailing_slash_and_case() {
        let mut first = event("a");
        first.url = Some("https://Example.org/e/1/".to_string());
        let mut second = event("b");
        second.url = Some("https://example.org/e/1".to_string());
        assert_eq!(
            DuplicateStrategy::Url.key(&first),
            DuplicateStrategy::Url.key(&second)
        );
        assert_eq!(DuplicateStrategy::Url.key(&event("c")), None);
    }
}
