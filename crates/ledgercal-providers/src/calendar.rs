//! RemoteCalendar trait definition.
//!
//! This module defines the [`RemoteCalendar`] trait, the capability the sync
//! engine needs from an external calendar: list the events of a window,
//! create one event, delete one event. Every call is per item; the engine
//! never assumes batch semantics.

use std::future::Future;
use std::pin::Pin;

use ledgercal_core::{DateWindow, NewRemoteEvent, RemoteEvent};

use crate::error::{ProviderError, ProviderResult};

/// A boxed future for async trait methods.
///
/// Keeps the trait object-safe so the engine can hold an
/// `Arc<dyn RemoteCalendar>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The external calendar the local store is reconciled against.
///
/// # Example Implementation
///
/// ```ignore
/// impl RemoteCalendar for MyCalendar {
///     fn name(&self) -> &str { "mine" }
///
///     fn list_events<'a>(&'a self, calendar_id: &'a str, window: DateWindow)
///         -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>>
///     {
///         Box::pin(async move { self.api.list(calendar_id, window).await })
///     }
///     // ... create_event, delete_event
/// }
/// ```
pub trait RemoteCalendar: Send + Sync {
    /// Returns the name of this backend (e.g. "google").
    fn name(&self) -> &str;

    /// Lists the events starting inside `window`.
    ///
    /// Implementations handle pagination internally and skip cancelled events.
    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: DateWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>>;

    /// Creates an all-day event and returns its external id.
    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: NewRemoteEvent,
    ) -> BoxFuture<'a, ProviderResult<String>>;

    /// Deletes an event. Deleting an event that is already gone succeeds.
    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        external_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

/// A calendar that fails every call with the same error.
///
/// Stands in for a backend that could not be configured, so the daemon can
/// still start and report the problem on each sync.
#[derive(Debug)]
pub struct ErrorCalendar {
    name: String,
    error: ProviderError,
}

impl ErrorCalendar {
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn error(&self) -> ProviderError {
        self.error.duplicate().with_provider(&self.name)
    }
}

impl RemoteCalendar for ErrorCalendar {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_events<'a>(
        &'a self,
        _calendar_id: &'a str,
        _window: DateWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn create_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        _event: NewRemoteEvent,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn delete_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        _external_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn error_calendar_fails_every_call() {
        let calendar = ErrorCalendar::new("google", ProviderError::configuration("no token"));
        let window = DateWindow::year(2025).unwrap();

        let err = calendar.list_events("primary", window).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert_eq!(err.provider(), Some("google"));

        let new = NewRemoteEvent {
            title: "x".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            description: None,
        };
        assert!(calendar.create_event("primary", new).await.is_err());
        assert!(calendar.delete_event("primary", "g-1").await.is_err());
    }
}
