//! In-memory store backend.
//!
//! Implements every persistence trait over plain maps. Used for dry runs and
//! tests; state is lost when the value is dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::event::{CalendarEvent, Company, EventId, LogicalId, NewCalendarEvent, SyncStatus};
use crate::store::{
    CompanyDirectory, EventQuery, EventStore, EventUpdate, StoreError, StoreResult, SyncLog,
    SyncTombstone, TombstoneTracker,
};
use crate::sync_log::{NewSyncLogEntry, SyncLogCounts, SyncLogEntry};

#[derive(Debug, Default)]
struct Inner {
    next_event_id: i64,
    events: BTreeMap<EventId, CalendarEvent>,
    tombstones: HashMap<LogicalId, SyncTombstone>,
    companies: Vec<Company>,
    log: Vec<SyncLogEntry>,
}

/// Map-backed implementation of the store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with company records.
    pub fn with_companies(companies: Vec<Company>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.companies = companies;
        }
        store
    }

    /// Adds or replaces a company record.
    pub fn upsert_company(&self, company: Company) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.companies.retain(|c| c.id != company.id);
        inner.companies.push(company);
        inner.companies.sort_by_key(|c| c.id);
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::database("memory store lock poisoned"))
    }
}

impl Inner {
    fn live_override_holder(&self, logical_id: &LogicalId) -> Option<EventId> {
        self.events
            .values()
            .find(|e| e.is_live() && e.overrides.as_ref() == Some(logical_id))
            .map(|e| e.id)
    }

    fn event_mut(&mut self, id: EventId) -> StoreResult<&mut CalendarEvent> {
        self.events
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("event", id))
    }
}

impl EventStore for MemoryStore {
    fn insert_event(&self, event: NewCalendarEvent) -> StoreResult<CalendarEvent> {
        let mut inner = self.lock()?;
        if event.sync_status != SyncStatus::Deleted {
            let holder = event
                .overrides
                .as_ref()
                .and_then(|logical_id| Some((logical_id, inner.live_override_holder(logical_id)?)));
            if let Some((logical_id, holder)) = holder {
                return Err(StoreError::constraint(format!(
                    "{logical_id} is already overridden by event {holder}"
                )));
            }
        }

        inner.next_event_id += 1;
        let now = Utc::now();
        let row = CalendarEvent {
            id: EventId(inner.next_event_id),
            title: event.title,
            date: event.date,
            description: event.description,
            event_type: event.event_type,
            overrides: event.overrides,
            last_synced_at: event.external_id.as_ref().map(|_| now),
            external_id: event.external_id,
            sync_status: event.sync_status,
            created_at: now,
            updated_at: now,
        };
        inner.events.insert(row.id, row.clone());
        Ok(row)
    }

    fn get_event(&self, id: EventId) -> StoreResult<Option<CalendarEvent>> {
        Ok(self.lock()?.events.get(&id).cloned())
    }

    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<CalendarEvent>> {
        Ok(self
            .lock()?
            .events
            .values()
            .find(|e| e.is_live() && e.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    fn list_events(&self, query: &EventQuery) -> StoreResult<Vec<CalendarEvent>> {
        let inner = self.lock()?;
        let mut out: Vec<_> = inner
            .events
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        out.sort_by_key(|e| (e.date, e.id));
        Ok(out)
    }

    fn update_event(&self, id: EventId, update: EventUpdate) -> StoreResult<CalendarEvent> {
        let mut inner = self.lock()?;
        let event = inner.event_mut(id)?;
        if let Some(title) = update.title {
            event.title = title;
        }
        if let Some(date) = update.date {
            event.date = date;
        }
        if let Some(description) = update.description {
            event.description = description;
        }
        if let Some(event_type) = update.event_type {
            event.event_type = event_type;
        }
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    fn mark_synced(&self, id: EventId, external_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let event = inner.event_mut(id)?;
        event.external_id = Some(external_id.to_string());
        event.sync_status = SyncStatus::Synced;
        event.last_synced_at = Some(at);
        event.updated_at = at;
        Ok(())
    }

    fn mark_deleted(&self, id: EventId) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let event = inner.event_mut(id)?;
        event.sync_status = SyncStatus::Deleted;
        event.updated_at = Utc::now();
        Ok(())
    }

    fn remove_event(&self, id: EventId) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        match inner.events.get(&id) {
            None => Ok(false),
            Some(event) if event.was_synced() => Err(StoreError::constraint(format!(
                "event {id} was synced and can only be soft-deleted"
            ))),
            Some(_) => Ok(inner.events.remove(&id).is_some()),
        }
    }
}

impl TombstoneTracker for MemoryStore {
    fn record_synced(&self, logical_id: &LogicalId, external_id: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        inner
            .tombstones
            .entry(logical_id.clone())
            .and_modify(|t| {
                t.external_id = Some(external_id.to_string());
                t.synced_at = now;
            })
            .or_insert_with(|| SyncTombstone {
                logical_id: logical_id.clone(),
                external_id: Some(external_id.to_string()),
                is_deleted: false,
                synced_at: now,
            });
        Ok(())
    }

    fn record_deleted(&self, logical_id: &LogicalId) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        inner
            .tombstones
            .entry(logical_id.clone())
            .and_modify(|t| {
                t.is_deleted = true;
                t.synced_at = now;
            })
            .or_insert_with(|| SyncTombstone {
                logical_id: logical_id.clone(),
                external_id: None,
                is_deleted: true,
                synced_at: now,
            });
        Ok(())
    }

    fn is_deleted(&self, logical_id: &LogicalId) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .tombstones
            .get(logical_id)
            .is_some_and(|t| t.is_deleted))
    }

    fn external_id_for(&self, logical_id: &LogicalId) -> StoreResult<Option<String>> {
        Ok(self
            .lock()?
            .tombstones
            .get(logical_id)
            .and_then(|t| t.external_id.clone()))
    }

    fn get_tombstone(&self, logical_id: &LogicalId) -> StoreResult<Option<SyncTombstone>> {
        Ok(self.lock()?.tombstones.get(logical_id).cloned())
    }

    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<SyncTombstone>> {
        Ok(self
            .lock()?
            .tombstones
            .values()
            .find(|t| t.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    fn list_tombstones(&self) -> StoreResult<Vec<SyncTombstone>> {
        let mut out: Vec<_> = self.lock()?.tombstones.values().cloned().collect();
        out.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
        Ok(out)
    }

    fn restore(&self, logical_id: &LogicalId) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        match inner.tombstones.get_mut(logical_id) {
            Some(t) if t.is_deleted => {
                t.is_deleted = false;
                // the remote copy is gone; the next pass pushes a fresh one
                t.external_id = None;
                t.synced_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl CompanyDirectory for MemoryStore {
    fn list_companies(&self) -> StoreResult<Vec<Company>> {
        Ok(self.lock()?.companies.clone())
    }
}

impl SyncLog for MemoryStore {
    fn append_entry(&self, entry: &NewSyncLogEntry) -> StoreResult<SyncLogEntry> {
        let mut inner = self.lock()?;
        let id = i64::try_from(inner.log.len()).unwrap_or(i64::MAX) + 1;
        let row = SyncLogEntry {
            id,
            calendar_id: entry.calendar_id.clone(),
            trigger: entry.trigger,
            started_at: entry.started_at,
            finished_at: entry.finished_at,
            summary: entry.summary.clone(),
            outcome: entry.outcome,
        };
        inner.log.push(row.clone());
        Ok(row)
    }

    fn recent_entries(&self, limit: usize) -> StoreResult<Vec<SyncLogEntry>> {
        Ok(self.lock()?.log.iter().rev().take(limit).cloned().collect())
    }

    fn counts_since(&self, since: DateTime<Utc>) -> StoreResult<SyncLogCounts> {
        let inner = self.lock()?;
        let mut counts = SyncLogCounts::default();
        for entry in inner.log.iter().filter(|e| e.finished_at >= since) {
            counts.add(entry.outcome, &entry.summary);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::store::{LocalDeletion, delete_local_event};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn second_live_override_is_rejected() {
        let store = MemoryStore::new();
        let id = LogicalId::new("acme-ltd-anniv-2025");
        store
            .insert_event(
                NewCalendarEvent::new("Acme party", date(2025, 3, 1), EventType::Anniversary)
                    .with_overrides(id.clone()),
            )
            .unwrap();
        let err = store
            .insert_event(
                NewCalendarEvent::new("Acme again", date(2025, 3, 1), EventType::Anniversary)
                    .with_overrides(id),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn deletion_is_monotonic() {
        let store = MemoryStore::new();
        let id = LogicalId::new("acme-ltd-anniv-2025");
        store.record_synced(&id, "ext-1").unwrap();
        store.record_deleted(&id).unwrap();
        store.record_synced(&id, "ext-2").unwrap();

        assert!(store.is_deleted(&id).unwrap());
        assert_eq!(store.external_id_for(&id).unwrap().as_deref(), Some("ext-2"));

        assert!(store.restore(&id).unwrap());
        assert!(!store.is_deleted(&id).unwrap());
        assert!(!store.restore(&id).unwrap());
    }

    #[test]
    fn user_delete_removes_or_tombstones() {
        let store = MemoryStore::new();
        let local = store
            .insert_event(NewCalendarEvent::new("Draft", date(2025, 1, 2), EventType::Reminder))
            .unwrap();
        assert_eq!(
            delete_local_event(&store, &store, local.id).unwrap(),
            LocalDeletion::Removed
        );
        assert!(store.get_event(local.id).unwrap().is_none());

        let synced = store
            .insert_event(NewCalendarEvent::new("Call", date(2025, 1, 3), EventType::Meeting))
            .unwrap();
        store.mark_synced(synced.id, "ext-9", Utc::now()).unwrap();
        assert_eq!(
            delete_local_event(&store, &store, synced.id).unwrap(),
            LocalDeletion::Tombstoned
        );
        let row = store.get_event(synced.id).unwrap().unwrap();
        assert_eq!(row.sync_status, SyncStatus::Deleted);
        assert!(store.is_deleted(&row.tombstone_key()).unwrap());
        assert!(matches!(
            store.remove_event(synced.id),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn list_hides_deleted_by_default() {
        let store = MemoryStore::new();
        let a = store
            .insert_event(NewCalendarEvent::new("A", date(2025, 2, 1), EventType::Meeting))
            .unwrap();
        store
            .insert_event(NewCalendarEvent::new("B", date(2025, 1, 1), EventType::Meeting))
            .unwrap();
        store.mark_deleted(a.id).unwrap();

        let live = store.list_events(&EventQuery::live()).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].title, "B");
        assert_eq!(
            store
                .list_events(&EventQuery::live().including_deleted())
                .unwrap()
                .len(),
            2
        );
    }
}
