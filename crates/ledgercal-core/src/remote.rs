//! Provider-agnostic views of remote calendar events.

use serde::{Deserialize, Serialize};

use crate::resolver::SyncCandidate;
use crate::time::EventTime;

/// An event as listed by the remote calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub external_id: String,
    pub title: String,
    pub start: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RemoteEvent {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>, start: EventTime) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            start,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An all-day event to create on the remote calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRemoteEvent {
    /// Title including any type prefix.
    pub title: String,
    pub date: chrono::NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&SyncCandidate> for NewRemoteEvent {
    fn from(candidate: &SyncCandidate) -> Self {
        Self {
            title: candidate.display_title(),
            date: candidate.date,
            description: candidate.description.clone(),
        }
    }
}
