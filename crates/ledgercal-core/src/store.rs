//! Persistence seams.
//!
//! The reconciliation engine talks to storage only through these traits so
//! the same algorithm runs against SQLite in production and
//! [`MemoryStore`](crate::memory::MemoryStore) in tests. All methods are
//! synchronous; async callers hold them for one statement at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{
    CalendarEvent, Company, EventId, EventType, LogicalId, NewCalendarEvent, SyncStatus,
};
use crate::sync_log::{NewSyncLogEntry, SyncLogCounts, SyncLogEntry};
use crate::time::DateWindow;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to execute a statement.
    #[error("database error: {0}")]
    Database(String),

    /// The referenced row does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A uniqueness or lifecycle rule was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A stored value could not be decoded.
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }
}

/// Filter for [`EventStore::list_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Only events whose day falls in the window.
    pub window: Option<DateWindow>,
    /// Only events in one of these statuses (all statuses when empty).
    pub statuses: Vec<SyncStatus>,
    /// Only events of this type.
    pub event_type: Option<EventType>,
    /// Only events that carry an override marker.
    pub overrides_only: bool,
    /// Include soft-deleted rows when `statuses` is empty.
    pub include_deleted: bool,
}

impl EventQuery {
    /// Every live event.
    pub fn live() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = SyncStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    #[must_use]
    pub fn overrides_only(mut self) -> Self {
        self.overrides_only = true;
        self
    }

    #[must_use]
    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Applies the filter to one event; backends that cannot push the filter
    /// down use this.
    pub fn matches(&self, event: &CalendarEvent) -> bool {
        if self.window.is_some_and(|window| !window.contains(event.date)) {
            return false;
        }
        if self.statuses.is_empty() {
            if !self.include_deleted && !event.is_live() {
                return false;
            }
        } else if !self.statuses.contains(&event.sync_status) {
            return false;
        }
        if self.event_type.is_some_and(|kind| event.event_type != kind) {
            return false;
        }
        !(self.overrides_only && event.overrides.is_none())
    }
}

/// Editable fields of an existing event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub date: Option<chrono::NaiveDate>,
    pub description: Option<Option<String>>,
    pub event_type: Option<EventType>,
}

/// Durable record of one logical event's remote identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTombstone {
    pub logical_id: LogicalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub is_deleted: bool,
    pub synced_at: DateTime<Utc>,
}

/// Locally owned calendar events.
pub trait EventStore: Send + Sync {
    fn insert_event(&self, event: NewCalendarEvent) -> StoreResult<CalendarEvent>;

    fn get_event(&self, id: EventId) -> StoreResult<Option<CalendarEvent>>;

    /// Finds the live event carrying `external_id`.
    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<CalendarEvent>>;

    /// Events matching `query`, ordered by date then id.
    fn list_events(&self, query: &EventQuery) -> StoreResult<Vec<CalendarEvent>>;

    /// Applies an edit. Sync status is left as is.
    fn update_event(&self, id: EventId, update: EventUpdate) -> StoreResult<CalendarEvent>;

    /// Records a successful push or link.
    fn mark_synced(&self, id: EventId, external_id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    /// Soft-deletes an event, keeping its external id.
    fn mark_deleted(&self, id: EventId) -> StoreResult<()>;

    /// Hard-deletes an event that was never synced.
    ///
    /// Returns [`StoreError::Constraint`] if the event has been synced.
    fn remove_event(&self, id: EventId) -> StoreResult<bool>;
}

/// Mapping from logical id to remote identity and deletion state.
///
/// Deletion is monotonic: once a tombstone is deleted, only [`restore`]
/// clears it.
///
/// [`restore`]: TombstoneTracker::restore
pub trait TombstoneTracker: Send + Sync {
    /// Records that `logical_id` exists remotely as `external_id`.
    ///
    /// Never clears an existing deletion.
    fn record_synced(&self, logical_id: &LogicalId, external_id: &str) -> StoreResult<()>;

    /// Marks `logical_id` as deleted, creating the tombstone if needed.
    fn record_deleted(&self, logical_id: &LogicalId) -> StoreResult<()>;

    fn is_deleted(&self, logical_id: &LogicalId) -> StoreResult<bool>;

    fn external_id_for(&self, logical_id: &LogicalId) -> StoreResult<Option<String>>;

    fn get_tombstone(&self, logical_id: &LogicalId) -> StoreResult<Option<SyncTombstone>>;

    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<SyncTombstone>>;

    fn list_tombstones(&self) -> StoreResult<Vec<SyncTombstone>>;

    /// Clears a deletion. Returns false if nothing was deleted.
    fn restore(&self, logical_id: &LogicalId) -> StoreResult<bool>;
}

/// Read access to company records.
pub trait CompanyDirectory: Send + Sync {
    fn list_companies(&self) -> StoreResult<Vec<Company>>;
}

/// Rolling history of sync passes.
pub trait SyncLog: Send + Sync {
    fn append_entry(&self, entry: &NewSyncLogEntry) -> StoreResult<SyncLogEntry>;

    /// Most recent entries first.
    fn recent_entries(&self, limit: usize) -> StoreResult<Vec<SyncLogEntry>>;

    fn counts_since(&self, since: DateTime<Utc>) -> StoreResult<SyncLogCounts>;
}

/// How a user-initiated delete was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalDeletion {
    /// Never synced; the row is gone.
    Removed,
    /// Synced before; soft-deleted and tombstoned.
    Tombstoned,
}

/// Deletes an event on behalf of the user.
///
/// Events that never reached the remote calendar are removed outright.
/// Anything else is soft-deleted and its tombstone marked deleted, so the next
/// full pass deletes the remote copy and no later pass resurrects it.
pub fn delete_local_event(
    events: &dyn EventStore,
    tracker: &dyn TombstoneTracker,
    id: EventId,
) -> StoreResult<LocalDeletion> {
    let event = events
        .get_event(id)?
        .ok_or_else(|| StoreError::not_found("event", id))?;

    if !event.was_synced() && event.overrides.is_none() {
        events.remove_event(id)?;
        tracing::debug!(event_id = %id, "Removed never-synced event");
        return Ok(LocalDeletion::Removed);
    }

    events.mark_deleted(id)?;
    tracker.record_deleted(&event.tombstone_key())?;
    tracing::debug!(event_id = %id, logical_id = %event.tombstone_key(), "Tombstoned event");
    Ok(LocalDeletion::Tombstoned)
}
