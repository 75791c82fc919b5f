//! Matching candidates against a remote snapshot.
//!
//! Matching is exact: the candidate's display title must equal the remote
//! title byte for byte, and the remote start must fall on the candidate's
//! day. A missed duplicate is preferred over linking unrelated events.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::remote::RemoteEvent;
use crate::resolver::SyncCandidate;

/// A remote listing indexed for lookups during one pass.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    events: Vec<RemoteEvent>,
    by_external_id: HashMap<String, usize>,
    by_title_date: HashMap<(String, NaiveDate), Vec<usize>>,
}

impl RemoteIndex {
    pub fn new(events: Vec<RemoteEvent>) -> Self {
        let mut by_external_id = HashMap::with_capacity(events.len());
        let mut by_title_date: HashMap<(String, NaiveDate), Vec<usize>> = HashMap::new();
        for (idx, event) in events.iter().enumerate() {
            by_external_id.entry(event.external_id.clone()).or_insert(idx);
            by_title_date
                .entry((event.title.clone(), event.start.date()))
                .or_default()
                .push(idx);
        }
        Self {
            events,
            by_external_id,
            by_title_date,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[RemoteEvent] {
        &self.events
    }

    pub fn contains_external_id(&self, external_id: &str) -> bool {
        self.by_external_id.contains_key(external_id)
    }

    pub fn get(&self, external_id: &str) -> Option<&RemoteEvent> {
        self.by_external_id
            .get(external_id)
            .map(|&idx| &self.events[idx])
    }

    /// Remote events with this exact title on this day, in listing order.
    pub fn matches<'a>(
        &'a self,
        title: &str,
        date: NaiveDate,
    ) -> impl Iterator<Item = &'a RemoteEvent> + 'a {
        self.by_title_date
            .get(&(title.to_string(), date))
            .into_iter()
            .flatten()
            .map(|&idx| &self.events[idx])
    }
}

/// What a pass does with one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The candidate already knows its remote identity.
    AlreadySynced(String),
    /// An unclaimed remote event matches; adopt its identity.
    Link(String),
    /// Nothing matches; create it remotely.
    Push,
}

/// Decides the fate of one candidate.
///
/// `claimed` holds external ids already owned by other logical events; those
/// remote events are never linked a second time.
pub fn decide(candidate: &SyncCandidate, index: &RemoteIndex, claimed: &HashSet<String>) -> Decision {
    if let Some(external_id) = &candidate.external_id {
        return Decision::AlreadySynced(external_id.clone());
    }
    index
        .matches(&candidate.display_title(), candidate.date)
        .find(|remote| !claimed.contains(&remote.external_id))
        .map_or(Decision::Push, |remote| {
            Decision::Link(remote.external_id.clone())
        })
}
