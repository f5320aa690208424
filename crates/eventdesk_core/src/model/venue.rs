//! Venue domain model.
//!
//! Venues are shared by many events and may be created as a side effect of
//! importing an event that names an unknown venue.

use crate::model::source::SourceId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type VenueId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub uuid: VenueId,
    pub title: String,
    pub address: Option<String>,
    pub url: Option<String>,
    /// Source whose import created this venue, if any.
    pub source_id: Option<SourceId>,
}

impl Venue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            address: None,
            url: None,
            source_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), VenueValidationError> {
        if self.title.trim().is_empty() {
            return Err(VenueValidationError::BlankTitle);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueValidationError {
    BlankTitle,
}

impl Display for VenueValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "venue title cannot be blank"),
        }
    }
}

impl Error for VenueValidationError {}
