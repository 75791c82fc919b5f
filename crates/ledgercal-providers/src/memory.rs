//! In-memory remote calendar.
//!
//! Behaves like a provider that accepts all-day events, with switches to
//! inject failures. Used by the engine's tests and for dry runs.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use ledgercal_core::{DateWindow, EventTime, NewRemoteEvent, RemoteEvent};
use tracing::trace;

use crate::calendar::{BoxFuture, RemoteCalendar};
use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    events: Vec<RemoteEvent>,
    failing_titles: HashSet<String>,
    list_error: Option<ProviderErrorCode>,
    auth_failure: bool,
    list_calls: usize,
    create_calls: usize,
    delete_calls: usize,
}

/// Calendar backed by a vector, with failure injection.
#[derive(Debug, Default)]
pub struct MemoryCalendar {
    state: Mutex<State>,
}

/// Call counters of a [`MemoryCalendar`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub delete: usize,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event as if created by someone else; returns its id.
    pub fn insert(&self, title: impl Into<String>, start: EventTime) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        state
            .events
            .push(RemoteEvent::new(id.clone(), title, start));
        id
    }

    /// Removes an event as if deleted by someone else.
    pub fn remove(&self, external_id: &str) -> bool {
        let mut state = self.lock();
        let before = state.events.len();
        state.events.retain(|e| e.external_id != external_id);
        state.events.len() != before
    }

    /// Makes every create with this exact title fail with a server error.
    pub fn fail_creates_for(&self, title: impl Into<String>) {
        self.lock().failing_titles.insert(title.into());
    }

    /// Makes listing fail with the given code.
    pub fn fail_listing(&self, code: Option<ProviderErrorCode>) {
        self.lock().list_error = code;
    }

    /// Makes every call fail with an authentication error.
    pub fn fail_auth(&self, fail: bool) {
        self.lock().auth_failure = fail;
    }

    pub fn events(&self) -> Vec<RemoteEvent> {
        self.lock().events.clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.lock().events.iter().map(|e| e.title.clone()).collect()
    }

    pub fn calls(&self) -> CallCounts {
        let state = self.lock();
        CallCounts {
            list: state.list_calls,
            create: state.create_calls,
            delete: state.delete_calls,
        }
    }

    // a poisoned lock only happens after a panicking test thread
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_auth(state: &State) -> ProviderResult<()> {
        if state.auth_failure {
            return Err(ProviderError::authentication("access token expired or invalid")
                .with_provider("memory"));
        }
        Ok(())
    }
}

impl RemoteCalendar for MemoryCalendar {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_events<'a>(
        &'a self,
        _calendar_id: &'a str,
        window: DateWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.list_calls += 1;
            Self::check_auth(&state)?;
            if let Some(code) = state.list_error {
                return Err(ProviderError::new(code, "listing failed").with_provider("memory"));
            }
            let mut events: Vec<_> = state
                .events
                .iter()
                .filter(|e| window.contains_event_time(&e.start))
                .cloned()
                .collect();
            events.sort_by(|a, b| a.start.cmp(&b.start));
            trace!(count = events.len(), %window, "Listed memory calendar");
            Ok(events)
        })
    }

    fn create_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        event: NewRemoteEvent,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.create_calls += 1;
            Self::check_auth(&state)?;
            if state.failing_titles.contains(&event.title) {
                return Err(ProviderError::server(format!("cannot create {}", event.title))
                    .with_provider("memory"));
            }
            state.next_id += 1;
            let id = format!("mem-{}", state.next_id);
            let mut remote = RemoteEvent::new(id.clone(), event.title, EventTime::AllDay(event.date));
            remote.description = event.description;
            state.events.push(remote);
            Ok(id)
        })
    }

    fn delete_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        external_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.delete_calls += 1;
            Self::check_auth(&state)?;
            state.events.retain(|e| e.external_id != external_id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_event(title: &str, day: NaiveDate) -> NewRemoteEvent {
        NewRemoteEvent {
            title: title.to_string(),
            date: day,
            description: None,
        }
    }

    #[tokio::test]
    async fn create_list_delete() {
        let calendar = MemoryCalendar::new();
        let window = DateWindow::year(2025).unwrap();

        let id = calendar
            .create_event("primary", new_event("Acme Ltd — 5th Anniversary", date(2025, 3, 1)))
            .await
            .unwrap();
        calendar.insert("Outside", EventTime::AllDay(date(2026, 1, 1)));

        let listed = calendar.list_events("primary", window).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].external_id, id);

        calendar.delete_event("primary", &id).await.unwrap();
        assert!(calendar.list_events("primary", window).await.unwrap().is_empty());
        assert_eq!(
            calendar.calls(),
            CallCounts {
                list: 2,
                create: 1,
                delete: 1
            }
        );
    }

    #[tokio::test]
    async fn injected_failures() {
        let calendar = MemoryCalendar::new();
        calendar.fail_creates_for("[Invoice] INV-1");
        let err = calendar
            .create_event("primary", new_event("[Invoice] INV-1", date(2025, 2, 1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);

        calendar.fail_auth(true);
        let err = calendar
            .list_events("primary", DateWindow::year(2025).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }
}
