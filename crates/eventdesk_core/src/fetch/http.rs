//! Blocking HTTP fetcher for calendar feeds.
//!
//! # Responsibility
//! - Download a source body with a bounded timeout.
//! - Translate transport and status failures into [`FetchError`] causes.
//!
//! # Invariants
//! - `401`/`407` always map to [`FetchError::Unauthorized`].
//! - The request timeout is owned here and surfaces as [`FetchError::Timeout`].

use super::ics::{parse_calendar, IcsError};
use super::{error_chain, Candidate, FetchError, SourceFetcher};
use crate::config::ImportConfig;
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::error::Error;
use std::io;
use std::time::{Duration, Instant};

const RESOLVE_FAILURE_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no such host",
];

/// [`SourceFetcher`] backed by a blocking reqwest client.
pub struct HttpSourceFetcher {
    client: Client,
}

impl HttpSourceFetcher {
    pub fn new(config: &ImportConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| FetchError::Other(Box::new(err)))?;
        Ok(Self { client })
    }
}

impl SourceFetcher for HttpSourceFetcher {
    fn fetch(&self, origin: &str) -> Result<Vec<Candidate>, FetchError> {
        let started_at = Instant::now();
        let response = self
            .client
            .get(origin)
            .send()
            .map_err(map_transport_error)?;

        if let Some(err) = status_error(response.status().as_u16()) {
            warn!(
                "event=source_fetch module=fetch status=error http_status={} duration_ms={}",
                response.status().as_u16(),
                started_at.elapsed().as_millis()
            );
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().map_err(map_transport_error)?;
        info!(
            "event=source_fetch module=fetch status=ok bytes={} duration_ms={}",
            body.len(),
            started_at.elapsed().as_millis()
        );

        parse_calendar(&body).map_err(|err| match err {
            IcsError::NotCalendar => FetchError::NoParser { content_type },
            IcsError::Malformed { .. } => FetchError::Parse(err.to_string()),
        })
    }
}

/// Maps a non-success status code to a fetch failure.
pub(crate) fn status_error(status: u16) -> Option<FetchError> {
    match status {
        200..=299 => None,
        401 | 407 => Some(FetchError::Unauthorized),
        other => Some(FetchError::Http { status: other }),
    }
}

fn map_transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }

    let rendered = error_chain(&err);
    match io_error_kind(&err) {
        Some(io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable) => {
            return FetchError::HostUnreachable(rendered);
        }
        Some(io::ErrorKind::TimedOut) => return FetchError::Timeout,
        _ => {}
    }

    if is_resolve_failure(&rendered) {
        return FetchError::Resolve(rendered);
    }
    if err.is_connect() || err.is_request() || err.is_body() {
        return FetchError::Connection(rendered);
    }
    FetchError::Other(Box::new(err))
}

fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut current = err.source();
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = cause.source();
    }
    None
}

fn is_resolve_failure(rendered: &str) -> bool {
    let lowered = rendered.to_lowercase();
    RESOLVE_FAILURE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
