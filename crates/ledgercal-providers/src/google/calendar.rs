//! [`RemoteCalendar`] implementation for Google Calendar.

use ledgercal_core::{DateWindow, NewRemoteEvent, RemoteEvent};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use crate::calendar::{BoxFuture, RemoteCalendar};
use crate::error::ProviderResult;

const PROVIDER_NAME: &str = "google";

/// Google Calendar backend.
#[derive(Debug)]
pub struct GoogleCalendar {
    client: GoogleCalendarClient,
}

impl GoogleCalendar {
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        let client = GoogleCalendarClient::new(config).map_err(|e| e.with_provider(PROVIDER_NAME))?;
        Ok(Self { client })
    }
}

impl RemoteCalendar for GoogleCalendar {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: DateWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move {
            self.client
                .list_events(calendar_id, window)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }

    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: NewRemoteEvent,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            self.client
                .insert_event(calendar_id, &event)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        external_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.client
                .delete_event(calendar_id, external_id)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn rejects_empty_token() {
        let err = GoogleCalendar::new(GoogleConfig::new("")).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert_eq!(err.provider(), Some("google"));
    }

    #[test]
    fn reports_name() {
        let calendar = GoogleCalendar::new(GoogleConfig::new("tok")).unwrap();
        assert_eq!(calendar.name(), "google");
    }
}
