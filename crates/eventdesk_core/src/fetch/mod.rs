//! Fetching and parsing external sources into candidate event records.
//!
//! # Responsibility
//! - Define the [`SourceFetcher`] seam the importer depends on.
//! - Name every way a fetch can fail so the import classifier can map it.
//!
//! # Invariants
//! - A fetcher has no persistent side effects; failure yields nothing.
//! - Candidates keep the order in which the source listed them.

pub mod http;
pub mod ics;

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Unvalidated event record produced by parsing a source.
///
/// Date and time arrive as separate raw components; the importer owns
/// parsing and defaulting them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
    /// Explicit venue identifier; wins over `venue_name` when present.
    pub venue_id: Option<String>,
    pub venue_name: Option<String>,
    pub tags: Vec<String>,
    /// Time zone the source attached to its times (`TZID`). Times are still
    /// read as UTC; the value is kept so local-time feeds can be diagnosed.
    pub time_zone: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn starting(mut self, date: impl Into<String>, time: impl Into<String>) -> Self {
        self.start_date = Some(date.into());
        self.start_time = Some(time.into());
        self
    }

    pub fn ending(mut self, date: impl Into<String>, time: impl Into<String>) -> Self {
        self.end_date = Some(date.into());
        self.end_time = Some(time.into());
        self
    }

    pub fn at_venue(mut self, name: impl Into<String>) -> Self {
        self.venue_name = Some(name.into());
        self
    }

    pub fn tagged<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Retrieves and parses one source.
///
/// Implementations must be shareable across threads so that different
/// sources can be imported concurrently.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, origin: &str) -> Result<Vec<Candidate>, FetchError>;
}

/// Failure cause raised while fetching or parsing a source.
#[derive(Debug)]
pub enum FetchError {
    /// Content was retrieved but no parser understands it.
    NoParser { content_type: Option<String> },
    /// The source demands credentials.
    Unauthorized,
    /// Host answered with a non-success status.
    Http { status: u16 },
    Timeout,
    /// Host resolved but refused or dropped the connection.
    Connection(String),
    HostUnreachable(String),
    /// Host name could not be resolved to an address.
    Resolve(String),
    /// Content claimed a supported format but could not be read.
    Parse(String),
    Other(Box<dyn Error + Send + Sync>),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoParser {
                content_type: Some(content_type),
            } => write!(f, "no parser for content type `{content_type}`"),
            Self::NoParser { content_type: None } => write!(f, "no parser for source content"),
            Self::Unauthorized => write!(f, "source requires authentication"),
            Self::Http { status } => write!(f, "source answered with HTTP status {status}"),
            Self::Timeout => write!(f, "source timed out"),
            Self::Connection(message) => write!(f, "connection failed: {message}"),
            Self::HostUnreachable(message) => write!(f, "host unreachable: {message}"),
            Self::Resolve(message) => write!(f, "cannot resolve host: {message}"),
            Self::Parse(message) => write!(f, "cannot parse source: {message}"),
            Self::Other(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Renders an error and its `source()` chain as one line.
pub(crate) fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = cause.source();
    }
    rendered
}
