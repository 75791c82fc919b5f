//! Google Calendar API client.
//!
//! Low-level HTTP client for the `events` collection: list a window with
//! pagination, insert an all-day event, delete by id.

use chrono::{DateTime, NaiveDate, Utc};
use ledgercal_core::{DateWindow, EventTime, NewRemoteEvent, RemoteEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::GoogleConfig;
use crate::error::{ProviderError, ProviderResult};

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleCalendarClient {
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.api_base,
            urlencoding::encode(calendar_id)
        )
    }

    /// Lists the non-cancelled events starting inside `window`.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        window: DateWindow,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let (time_min, time_max) = window.to_utc_bounds();
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(calendar_id, time_min, time_max, page_token.as_deref())
                .await?;

            all_events.extend(page.items.into_iter().filter_map(convert_event));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        // timeMin/timeMax select by overlap; keep only events starting in the window
        all_events.retain(|e: &RemoteEvent| window.contains_event_time(&e.start));

        debug!(
            count = all_events.len(),
            calendar_id, "Fetched events from Google Calendar"
        );
        Ok(all_events)
    }

    async fn list_events_page(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let mut request = self
            .http_client
            .get(self.events_url(calendar_id))
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("maxResults", self.config.page_size.to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(map_send_error)?;
        let response = check_status(response, "access denied to calendar").await?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
        })
    }

    /// Inserts an all-day event and returns its id.
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewRemoteEvent,
    ) -> ProviderResult<String> {
        let body = InsertEventRequest::all_day(event)?;
        let response = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response, "no write access to calendar").await?;

        let created: InsertEventResponse = response.json().await.map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse created event: {}", e))
        })?;
        debug!(external_id = %created.id, title = %event.title, "Created Google Calendar event");
        Ok(created.id)
    }

    /// Deletes an event. A 404 or 410 means it is already gone.
    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<()> {
        let url = format!("{}/{}", self.events_url(calendar_id), urlencoding::encode(event_id));
        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            debug!(event_id, "Event already deleted remotely");
            return Ok(());
        }
        check_status(response, "no write access to calendar").await?;
        Ok(())
    }
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::network("request timeout")
    } else if e.is_connect() {
        ProviderError::network(format!("connection failed: {}", e))
    } else {
        ProviderError::network(format!("request failed: {}", e))
    }
}

/// Maps non-success statuses onto provider error codes.
async fn check_status(
    response: reqwest::Response,
    forbidden_message: &str,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )));
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ProviderError::authentication(
            "access token expired or invalid",
        ));
    }

    if status == reqwest::StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        // Google reports quota exhaustion as 403 too
        if body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded") {
            return Err(ProviderError::rate_limited("quota exceeded"));
        }
        return Err(ProviderError::authorization(forbidden_message));
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::not_found(format!("API error ({}): {}", status, body)));
    }
    if status.is_client_error() {
        return Err(ProviderError::bad_request(format!("API error ({}): {}", status, body)));
    }
    Err(ProviderError::server(format!("API error ({}): {}", status, body)))
}

/// Converts an API event, skipping cancelled or malformed ones.
fn convert_event(event: ApiEvent) -> Option<RemoteEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }
    let id = event.id?;

    let start = match (event.start.date_time, event.start.date) {
        (Some(dt), _) => {
            let parsed = DateTime::parse_from_rfc3339(&dt)
                .map_err(|e| warn!(event_id = %id, "failed to parse start time: {}", e))
                .ok()?;
            EventTime::DateTime(parsed)
        }
        (None, Some(date)) => {
            let parsed = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| warn!(event_id = %id, "failed to parse start date: {}", e))
                .ok()?;
            EventTime::AllDay(parsed)
        }
        (None, None) => {
            warn!(event_id = %id, "event has no start time");
            return None;
        }
    };

    Some(RemoteEvent {
        external_id: id,
        title: event.summary.unwrap_or_default(),
        start,
        description: event.description,
    })
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertEventRequest<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: ApiEventTime,
    end: ApiEventTime,
    transparency: &'static str,
}

impl<'a> InsertEventRequest<'a> {
    /// All-day events end on the following day (exclusive).
    fn all_day(event: &'a NewRemoteEvent) -> ProviderResult<Self> {
        let end = event
            .date
            .succ_opt()
            .ok_or_else(|| ProviderError::bad_request(format!("no day after {}", event.date)))?;
        Ok(Self {
            summary: &event.title,
            description: event.description.as_deref(),
            start: ApiEventTime {
                date: Some(event.date.format("%Y-%m-%d").to_string()),
                date_time: None,
            },
            end: ApiEventTime {
                date: Some(end.format("%Y-%m-%d").to_string()),
                date_time: None,
            },
            transparency: "transparent",
        })
    }
}

#[derive(Debug, Deserialize)]
struct InsertEventResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "items": [
                {
                    "id": "event1",
                    "summary": "[Meeting] Board",
                    "start": { "dateTime": "2025-03-15T10:00:00+01:00" },
                    "status": "confirmed"
                },
                {
                    "id": "event2",
                    "summary": "Acme Ltd — 5th Anniversary",
                    "start": { "date": "2025-03-01" }
                },
                {
                    "id": "event3",
                    "status": "cancelled",
                    "start": { "date": "2025-03-02" }
                }
            ],
            "nextPageToken": "abc"
        }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.next_page_token.as_deref(), Some("abc"));
        let events: Vec<_> = response.items.into_iter().filter_map(convert_event).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start.date(), date(2025, 3, 15));
        assert!(!events[0].start.is_all_day());
        assert_eq!(events[1].start, EventTime::AllDay(date(2025, 3, 1)));
    }

    #[test]
    fn timed_event_keeps_its_local_day() {
        let event: ApiEvent = serde_json::from_str(
            r#"{"id": "late", "summary": "Launch", "start": { "dateTime": "2025-03-01T00:30:00+02:00" }}"#,
        )
        .unwrap();
        let event = convert_event(event).unwrap();
        assert_eq!(event.start.date(), date(2025, 3, 1));

        let event: ApiEvent = serde_json::from_str(
            r#"{"id": "eve", "summary": "Retro", "start": { "dateTime": "2025-02-28T21:00:00-05:00" }}"#,
        )
        .unwrap();
        assert_eq!(convert_event(event).unwrap().start.date(), date(2025, 2, 28));
    }

    #[test]
    fn event_without_start_is_skipped() {
        let event: ApiEvent = serde_json::from_str(r#"{"id": "x", "summary": "?"}"#).unwrap();
        assert!(convert_event(event).is_none());
    }

    #[test]
    fn insert_body_is_all_day() {
        let event = NewRemoteEvent {
            title: "[Invoice] INV-9".to_string(),
            date: date(2025, 12, 31),
            description: Some("Due".to_string()),
        };
        let body = serde_json::to_value(InsertEventRequest::all_day(&event).unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "summary": "[Invoice] INV-9",
                "description": "Due",
                "start": { "date": "2025-12-31" },
                "end": { "date": "2026-01-01" },
                "transparency": "transparent"
            })
        );
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let client = GoogleCalendarClient::new(GoogleConfig::new("tok")).unwrap();
        assert_eq!(
            client.events_url("team@group.calendar.google.com"),
            "https://www.googleapis.com/calendar/v3/calendars/team%40group.calendar.google.com/events"
        );
    }
}
