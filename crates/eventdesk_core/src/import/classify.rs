//! Import failure classification.
//!
//! Every failure of a fetch attempt is mapped to exactly one
//! [`ImportFailureKind`] by scanning [`CLASSIFICATION_TABLE`] top to bottom.
//! The first matching row wins; anything unmatched is
//! [`ImportFailureKind::UnknownImportError`] and keeps its cause.

use crate::fetch::{error_chain, FetchError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// User-facing category of a failed import attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFailureKind {
    NoEventsFound,
    AuthenticationRequired,
    ConnectivityProblem,
    HostUnreachable,
    InvalidOriginReference,
    UnknownImportError,
}

impl ImportFailureKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::NoEventsFound => "no_events_found",
            Self::AuthenticationRequired => "authentication_required",
            Self::ConnectivityProblem => "connectivity_problem",
            Self::HostUnreachable => "host_unreachable",
            Self::InvalidOriginReference => "invalid_origin_reference",
            Self::UnknownImportError => "unknown_import_error",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NoEventsFound => "No events were found at this source",
            Self::AuthenticationRequired => {
                "This source requires a login, which is not supported"
            }
            Self::ConnectivityProblem => "The source could not be retrieved",
            Self::HostUnreachable => "The source's host could not be reached",
            Self::InvalidOriginReference => "The source's address could not be resolved",
            Self::UnknownImportError => "An unknown error occurred while importing",
        }
    }
}

/// Classified failure of one import attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub kind: ImportFailureKind,
    /// Rendered original cause, kept for diagnostics.
    pub cause: Option<String>,
}

impl Display for ImportFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.kind, self.cause.as_deref()) {
            (ImportFailureKind::UnknownImportError, Some(cause)) => {
                write!(f, "{}: {cause}", self.kind.message())
            }
            (kind, _) => write!(f, "{}", kind.message()),
        }
    }
}

impl Error for ImportFailure {}

/// What a fetch attempt produced when it did not yield usable candidates.
#[derive(Debug, Clone, Copy)]
pub enum FetchFailure<'a> {
    /// Fetch and parse succeeded with zero candidates.
    NoCandidates,
    Error(&'a FetchError),
}

type Matcher = fn(&FetchFailure<'_>) -> bool;

/// Ordered from most to least specific.
const CLASSIFICATION_TABLE: &[(ImportFailureKind, Matcher)] = &[
    (ImportFailureKind::NoEventsFound, is_no_events),
    (ImportFailureKind::AuthenticationRequired, is_auth_required),
    (ImportFailureKind::ConnectivityProblem, is_connectivity_problem),
    (ImportFailureKind::HostUnreachable, is_host_unreachable),
    (ImportFailureKind::InvalidOriginReference, is_unresolvable),
];

/// Maps a failed fetch attempt to exactly one import failure.
pub fn classify(failure: FetchFailure<'_>) -> ImportFailure {
    let cause = match failure {
        FetchFailure::NoCandidates => None,
        FetchFailure::Error(err) => Some(error_chain(err)),
    };

    let kind = CLASSIFICATION_TABLE
        .iter()
        .find(|(_, matches)| matches(&failure))
        .map_or(ImportFailureKind::UnknownImportError, |(kind, _)| *kind);

    ImportFailure { kind, cause }
}

fn is_no_events(failure: &FetchFailure<'_>) -> bool {
    matches!(
        failure,
        FetchFailure::NoCandidates | FetchFailure::Error(FetchError::NoParser { .. })
    )
}

fn is_auth_required(failure: &FetchFailure<'_>) -> bool {
    matches!(failure, FetchFailure::Error(FetchError::Unauthorized))
}

fn is_connectivity_problem(failure: &FetchFailure<'_>) -> bool {
    matches!(
        failure,
        FetchFailure::Error(
            FetchError::Http { .. } | FetchError::Timeout | FetchError::Connection(_)
        )
    )
}

fn is_host_unreachable(failure: &FetchFailure<'_>) -> bool {
    matches!(failure, FetchFailure::Error(FetchError::HostUnreachable(_)))
}

fn is_unresolvable(failure: &FetchFailure<'_>) -> bool {
    matches!(failure, FetchFailure::Error(FetchError::Resolve(_)))
}
