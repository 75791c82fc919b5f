//! Request and response types exchanged over the socket.

use chrono::{DateTime, Utc};
use ledgercal_core::{DateWindow, PassOutcome, SyncStatusReport, SyncSummary, SyncType};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Wrapper around every message, carrying the version and a correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub protocol_version: String,
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

fn default_true() -> bool {
    true
}

/// Parameters of one reconciliation pass.
///
/// Every field is optional on the wire; missing fields take the values of
/// [`SyncParams::default`]. A missing `calendar_id` or `window` means the
/// server's configured calendar and rolling window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub sync_type: SyncType,
    #[serde(default = "default_true")]
    pub include_anniversary_events: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<DateWindow>,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self {
            calendar_id: None,
            sync_type: SyncType::All,
            include_anniversary_events: true,
            window: None,
        }
    }
}

impl SyncParams {
    #[must_use]
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = Some(calendar_id.into());
        self
    }

    #[must_use]
    pub fn with_sync_type(mut self, sync_type: SyncType) -> Self {
        self.sync_type = sync_type;
        self
    }

    #[must_use]
    pub fn with_anniversaries(mut self, include: bool) -> Self {
        self.include_anniversary_events = include;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// Requests a client can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Run one reconciliation pass and return its summary.
    Sync {
        #[serde(flatten)]
        params: SyncParams,
    },

    /// Recent sync history and rolling 24h counts.
    SyncStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },

    /// Daemon status.
    Status,

    Shutdown,

    Ping,
}

impl Request {
    pub fn sync(params: SyncParams) -> Self {
        Self::Sync { params }
    }

    pub fn sync_status(limit: Option<usize>) -> Self {
        Self::SyncStatus { limit }
    }
}

/// Responses the server sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    SyncResult {
        #[serde(flatten)]
        summary: SyncSummary,
    },

    SyncStatus {
        #[serde(flatten)]
        report: SyncStatusReport,
    },

    Status {
        info: StatusInfo,
    },

    Ok,

    Error {
        #[serde(flatten)]
        error: ErrorResponse,
    },

    Pong,
}

impl Response {
    pub fn sync_result(summary: SyncSummary) -> Self {
        Self::SyncResult { summary }
    }

    pub fn sync_status(report: SyncStatusReport) -> Self {
        Self::SyncStatus { report }
    }

    pub fn status(info: StatusInfo) -> Self {
        Self::Status { info }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse::new(code, message),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Daemon status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub uptime_seconds: u64,
    /// Remote calendar backend name (e.g. "google").
    pub provider: String,
    pub calendar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<PassOutcome>,
    /// When the background scheduler runs next; absent when it is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scheduled_sync: Option<DateTime<Utc>>,
}

impl StatusInfo {
    pub fn new(
        uptime_seconds: u64,
        provider: impl Into<String>,
        calendar_id: impl Into<String>,
    ) -> Self {
        Self {
            uptime_seconds,
            provider: provider.into(),
            calendar_id: calendar_id.into(),
            last_sync: None,
            last_outcome: None,
            next_scheduled_sync: None,
        }
    }

    #[must_use]
    pub fn with_last_sync(mut self, at: DateTime<Utc>, outcome: PassOutcome) -> Self {
        self.last_sync = Some(at);
        self.last_outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_next_scheduled_sync(mut self, at: DateTime<Utc>) -> Self {
        self.next_scheduled_sync = Some(at);
        self
    }
}

/// Error codes carried by [`Response::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InternalError,
    InvalidRequest,
    Timeout,
    /// The remote calendar rejected our credentials; the pass was aborted.
    AuthenticationFailed,
    ProviderError,
    RateLimited,
    NotFound,
    ShuttingDown,
}

impl ErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::InternalError => "An internal error occurred",
            Self::InvalidRequest => "The request was invalid",
            Self::Timeout => "The request timed out",
            Self::AuthenticationFailed => "Calendar authentication failed",
            Self::ProviderError => "Calendar provider returned an error",
            Self::RateLimited => "Rate limited by calendar provider",
            Self::NotFound => "Requested resource not found",
            Self::ShuttingDown => "Server is shutting down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}
