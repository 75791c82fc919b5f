//! Override resolution.
//!
//! Folds generated anniversary occurrences and local events into the set of
//! candidates a pass will consider for push. An occurrence is dropped when a
//! live local event overrides it or when its tombstone is deleted.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anniversary::GeneratedOccurrence;
use crate::event::{CalendarEvent, EventId, EventType, LogicalId, SyncType};
use crate::store::{StoreResult, TombstoneTracker};

/// Identity of a candidate within one pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CandidateKey {
    /// Backed by a row in the event store.
    Persisted(EventId),
    /// Computed by the anniversary generator, not stored.
    Generated(LogicalId),
}

impl std::fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "event #{id}"),
            Self::Generated(logical_id) => write!(f, "{logical_id}"),
        }
    }
}

/// An event considered for push during one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCandidate {
    pub key: CandidateKey,
    /// Key of the tombstone tracking this candidate's remote identity.
    pub tombstone_key: LogicalId,
    pub title: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub event_type: EventType,
    /// Remote identity already known for this candidate.
    pub external_id: Option<String>,
}

impl SyncCandidate {
    pub fn from_event(event: &CalendarEvent) -> Self {
        Self {
            key: CandidateKey::Persisted(event.id),
            tombstone_key: event.tombstone_key(),
            title: event.title.clone(),
            date: event.date,
            description: event.description.clone(),
            event_type: event.event_type,
            external_id: event.external_id.clone(),
        }
    }

    pub fn from_occurrence(occurrence: GeneratedOccurrence, external_id: Option<String>) -> Self {
        Self {
            key: CandidateKey::Generated(occurrence.logical_id.clone()),
            tombstone_key: occurrence.logical_id,
            title: occurrence.title,
            date: occurrence.date,
            description: None,
            event_type: EventType::Anniversary,
            external_id,
        }
    }

    /// Title as written to, and matched against, the remote calendar.
    pub fn display_title(&self) -> String {
        self.event_type.display_title(&self.title)
    }

    pub fn persisted_id(&self) -> Option<EventId> {
        match &self.key {
            CandidateKey::Persisted(id) => Some(*id),
            CandidateKey::Generated(_) => None,
        }
    }
}

/// Result of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub candidates: Vec<SyncCandidate>,
    /// Occurrences dropped because a live local event overrides them.
    pub superseded: usize,
    /// Occurrences and overrides dropped because their tombstone is deleted.
    pub tombstoned: usize,
    /// Tombstone keys seen more than once; only the first was kept.
    pub duplicates: Vec<LogicalId>,
}

/// Builds the candidate set of one pass.
///
/// `local_events` should contain every live event that may carry an override
/// marker, not just those inside the window, so out-of-window overrides still
/// suppress their occurrence.
pub fn resolve(
    local_events: &[CalendarEvent],
    generated: Vec<GeneratedOccurrence>,
    sync_type: SyncType,
    tracker: &dyn TombstoneTracker,
) -> StoreResult<ResolveOutcome> {
    let mut outcome = ResolveOutcome::default();

    // superseded ids, each held by the lowest live event id
    let mut overridden: HashMap<&LogicalId, EventId> = HashMap::new();
    for event in local_events.iter().filter(|e| e.is_live()) {
        if let Some(logical_id) = &event.overrides {
            overridden
                .entry(logical_id)
                .and_modify(|holder| *holder = (*holder).min(event.id))
                .or_insert(event.id);
        }
    }

    let mut seen: HashSet<LogicalId> = HashSet::new();

    for occurrence in generated {
        if overridden.contains_key(&occurrence.logical_id) {
            debug!(logical_id = %occurrence.logical_id, "Occurrence superseded by local override");
            outcome.superseded += 1;
            continue;
        }
        if tracker.is_deleted(&occurrence.logical_id)? {
            debug!(logical_id = %occurrence.logical_id, "Occurrence tombstoned");
            outcome.tombstoned += 1;
            continue;
        }
        if !seen.insert(occurrence.logical_id.clone()) {
            warn!(logical_id = %occurrence.logical_id, "Duplicate generated occurrence skipped");
            outcome.duplicates.push(occurrence.logical_id);
            continue;
        }
        let external_id = tracker.external_id_for(&occurrence.logical_id)?;
        outcome
            .candidates
            .push(SyncCandidate::from_occurrence(occurrence, external_id));
    }

    for event in local_events {
        if !event.sync_status.awaits_push() || !event.matches_sync_type(sync_type) {
            continue;
        }
        if let Some(logical_id) = &event.overrides {
            if overridden.get(logical_id) != Some(&event.id) {
                warn!(
                    event_id = %event.id,
                    logical_id = %logical_id,
                    "Second live override for the same occurrence skipped"
                );
                outcome.duplicates.push(logical_id.clone());
                continue;
            }
            if tracker.is_deleted(logical_id)? {
                debug!(event_id = %event.id, logical_id = %logical_id, "Override of a tombstoned occurrence skipped");
                outcome.tombstoned += 1;
                continue;
            }
        }

        let candidate = SyncCandidate::from_event(event);
        if !seen.insert(candidate.tombstone_key.clone()) {
            warn!(
                event_id = %event.id,
                logical_id = %candidate.tombstone_key,
                "Duplicate candidate skipped"
            );
            outcome.duplicates.push(candidate.tombstone_key);
            continue;
        }
        outcome.candidates.push(candidate);
    }

    debug!(
        candidates = outcome.candidates.len(),
        superseded = outcome.superseded,
        tombstoned = outcome.tombstoned,
        duplicates = outcome.duplicates.len(),
        "Resolved sync candidates"
    );
    Ok(outcome)
}
