//! Request/response dispatch handler.
//!
//! Routes incoming requests to the orchestrator or the sync log and turns
//! the results into protocol responses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use ledgercal_core::{PassOutcome, SyncLog, SyncStatusReport, SyncSummary, SyncTrigger};
use ledgercal_protocol::{ErrorCode, Request, Response, StatusInfo, SyncParams};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::SyncDefaults;
use crate::error::{ServerError, ServerResult, SyncError};
use crate::orchestrator::{SyncOrchestrator, SyncRequest};
use crate::scheduler::SchedulerHandle;
use crate::shutdown::ShutdownHandle;
use crate::socket::Connection;

/// Default number of log entries returned by a status query.
pub const DEFAULT_STATUS_LIMIT: usize = 10;
/// Upper bound on log entries returned by a status query.
pub const MAX_STATUS_LIMIT: usize = 100;

/// Server state shared across all connections.
#[derive(Debug)]
pub struct ServerState {
    start_time: DateTime<Utc>,
    provider: String,
    calendar_id: String,
    last_sync: Option<(DateTime<Utc>, PassOutcome)>,
    shutdown_requested: bool,
    scheduler_handle: Option<SchedulerHandle>,
}

impl ServerState {
    pub fn new(provider: impl Into<String>, calendar_id: impl Into<String>) -> Self {
        Self {
            start_time: Utc::now(),
            provider: provider.into(),
            calendar_id: calendar_id.into(),
            last_sync: None,
            shutdown_requested: false,
            scheduler_handle: None,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        let duration = Utc::now() - self.start_time;
        duration.num_seconds().max(0) as u64
    }

    /// Records the end of a pass, whoever triggered it.
    pub fn record_pass(&mut self, outcome: PassOutcome) {
        self.last_sync = Some((Utc::now(), outcome));
    }

    pub fn last_sync(&self) -> Option<(DateTime<Utc>, PassOutcome)> {
        self.last_sync
    }

    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn set_scheduler_handle(&mut self, handle: SchedulerHandle) {
        self.scheduler_handle = Some(handle);
    }

    pub fn scheduler_handle(&self) -> Option<&SchedulerHandle> {
        self.scheduler_handle.as_ref()
    }
}

/// Shared server state wrapped in an Arc<RwLock>.
pub type SharedState = Arc<RwLock<ServerState>>;

pub fn new_shared_state(provider: impl Into<String>, calendar_id: impl Into<String>) -> SharedState {
    Arc::new(RwLock::new(ServerState::new(provider, calendar_id)))
}

/// Turns a pass result into the outcome the status view reports.
pub fn pass_outcome(result: &Result<SyncSummary, SyncError>) -> PassOutcome {
    match result {
        Ok(summary) => summary.outcome(),
        Err(_) => PassOutcome::Failed,
    }
}

/// Request handler that processes incoming requests and produces responses.
#[derive(Clone)]
pub struct RequestHandler {
    state: SharedState,
    orchestrator: Arc<SyncOrchestrator>,
    log: Arc<dyn SyncLog>,
    defaults: SyncDefaults,
}

impl RequestHandler {
    pub fn new(
        state: SharedState,
        orchestrator: Arc<SyncOrchestrator>,
        log: Arc<dyn SyncLog>,
        defaults: SyncDefaults,
    ) -> Self {
        Self {
            state,
            orchestrator,
            log,
            defaults,
        }
    }

    /// Handles a single request and returns the response.
    #[tracing::instrument(skip(self), fields(request_type, duration_ms))]
    pub async fn handle(&self, request: &Request) -> Response {
        use tracing::Span;

        let start = std::time::Instant::now();
        let request_type = request_name(request);
        Span::current().record("request_type", request_type);

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Status => {
                debug!("Handling Status request");
                self.status().await
            }
            Request::Sync { params } => {
                debug!(?params, "Handling Sync request");
                self.sync(params).await
            }
            Request::SyncStatus { limit } => {
                debug!(?limit, "Handling SyncStatus request");
                self.sync_status(*limit)
            }
            Request::Shutdown => {
                info!("Handling Shutdown request");
                self.state.write().await.request_shutdown();
                Response::Ok
            }
        };

        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            Span::current().record("duration_ms", duration.as_millis());
            debug!(
                request_type,
                duration_ms = duration.as_millis(),
                "Request handled"
            );
        }

        response
    }

    async fn status(&self) -> Response {
        let (mut info, scheduler) = {
            let state = self.state.read().await;
            let mut info =
                StatusInfo::new(state.uptime_seconds(), &state.provider, &state.calendar_id);
            if let Some((at, outcome)) = state.last_sync() {
                info = info.with_last_sync(at, outcome);
            }
            (info, state.scheduler_handle().cloned())
        };
        if let Some(handle) = scheduler
            && let Some(next) = handle.next_run().await
        {
            info = info.with_next_scheduled_sync(next);
        }
        Response::status(info)
    }

    /// Applies the configured defaults to the wire parameters.
    fn build_request(&self, params: &SyncParams) -> Result<SyncRequest, String> {
        let window = match params.window {
            Some(window) => window,
            None => self
                .defaults
                .window(Local::now().date_naive())
                .map_err(|e| e.to_string())?,
        };
        if window.is_empty() {
            return Err(format!("window {window} is empty"));
        }
        let calendar_id = params
            .calendar_id
            .clone()
            .unwrap_or_else(|| self.defaults.calendar_id.clone());

        Ok(SyncRequest::new(calendar_id, window)
            .with_sync_type(params.sync_type)
            .with_anniversaries(params.include_anniversary_events)
            .with_trigger(SyncTrigger::Manual))
    }

    async fn sync(&self, params: &SyncParams) -> Response {
        let request = match self.build_request(params) {
            Ok(request) => request,
            Err(message) => return Response::error(ErrorCode::InvalidRequest, message),
        };

        let result = self.orchestrator.unified_sync(request).await;
        self.state.write().await.record_pass(pass_outcome(&result));

        match result {
            Ok(summary) => Response::sync_result(summary),
            Err(SyncError::Auth(e)) => {
                Response::error(ErrorCode::AuthenticationFailed, e.to_string())
            }
        }
    }

    fn sync_status(&self, limit: Option<usize>) -> Response {
        let limit = limit
            .unwrap_or(DEFAULT_STATUS_LIMIT)
            .clamp(1, MAX_STATUS_LIMIT);
        let since = Utc::now() - chrono::Duration::hours(24);

        let report = self.log.recent_entries(limit).and_then(|recent| {
            Ok(SyncStatusReport {
                recent,
                last_24h: self.log.counts_since(since)?,
            })
        });
        match report {
            Ok(report) => Response::sync_status(report),
            Err(e) => {
                warn!(error = %e, "Failed to read sync log");
                Response::error(ErrorCode::InternalError, format!("failed to read sync log: {e}"))
            }
        }
    }

    /// Handles a connection, processing all requests until the connection closes.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            match conn.read_request().await {
                Ok(Some(envelope)) => {
                    let response = self.handle(&envelope.payload).await;
                    conn.respond(&envelope.request_id, response).await?;

                    if self.state.read().await.shutdown_requested() {
                        return Err(ServerError::Shutdown);
                    }
                }
                Ok(None) => {
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Error reading request");
                    return Err(e);
                }
            }
        }
    }
}

fn request_name(request: &Request) -> &'static str {
    match request {
        Request::Sync { .. } => "sync",
        Request::SyncStatus { .. } => "sync_status",
        Request::Status => "status",
        Request::Shutdown => "shutdown",
        Request::Ping => "ping",
    }
}

/// Creates a connection handler function for use with `SocketServer::run`.
///
/// A `Shutdown` request received on any connection triggers `shutdown`.
pub fn make_connection_handler(
    handler: RequestHandler,
    shutdown: ShutdownHandle,
) -> impl Fn(Connection) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
    move |conn| {
        let handler = handler.clone();
        let shutdown = shutdown.clone();
        Box::pin(async move {
            match handler.handle_connection(conn).await {
                Ok(()) => {}
                Err(ServerError::Shutdown) => shutdown.trigger(),
                Err(e) => warn!(error = %e, "Connection handler error"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgercal_core::{Company, DateWindow, MemoryStore, SyncType};
    use ledgercal_providers::MemoryCalendar;

    fn handler() -> (RequestHandler, Arc<MemoryCalendar>, SharedState) {
        let store = Arc::new(MemoryStore::with_companies(vec![Company::new(
            1,
            "Acme Ltd",
            NaiveDate::from_ymd_opt(2020, 3, 1),
        )]));
        let calendar = Arc::new(MemoryCalendar::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(store.clone(), calendar.clone()));
        let state = new_shared_state("memory", "primary");
        let handler =
            RequestHandler::new(state.clone(), orchestrator, store, SyncDefaults::default());
        (handler, calendar, state)
    }

    fn year_2025() -> SyncParams {
        SyncParams::default().with_window(DateWindow::year(2025).unwrap())
    }

    #[test]
    fn server_state_shutdown() {
        let mut state = ServerState::new("memory", "primary");
        assert!(!state.shutdown_requested());
        state.request_shutdown();
        assert!(state.shutdown_requested());
    }

    #[tokio::test]
    async fn request_handler_ping() {
        let (handler, _, _) = handler();
        assert_eq!(handler.handle(&Request::Ping).await, Response::Pong);
    }

    #[tokio::test]
    async fn sync_returns_summary_and_updates_status() {
        let (handler, calendar, _) = handler();

        let response = handler.handle(&Request::sync(year_2025())).await;
        let Response::SyncResult { summary } = response else {
            panic!("expected SyncResult, got {response:?}");
        };
        assert_eq!(summary.pushed, 1);
        assert_eq!(summary.sync_type, SyncType::All);
        assert_eq!(calendar.titles(), vec!["Acme Ltd — 5th Anniversary"]);

        let Response::Status { info } = handler.handle(&Request::Status).await else {
            panic!("expected Status");
        };
        assert_eq!(info.provider, "memory");
        assert_eq!(info.last_outcome, Some(PassOutcome::Success));
        assert!(info.next_scheduled_sync.is_none());
    }

    #[tokio::test]
    async fn sync_auth_failure_is_an_error_response() {
        let (handler, calendar, state) = handler();
        calendar.fail_auth(true);

        let response = handler.handle(&Request::sync(year_2025())).await;
        let error = response.as_error().unwrap();
        assert_eq!(error.code, ErrorCode::AuthenticationFailed);
        assert_eq!(
            state.read().await.last_sync().map(|(_, outcome)| outcome),
            Some(PassOutcome::Failed)
        );
    }

    #[tokio::test]
    async fn empty_window_is_rejected() {
        let (handler, calendar, _) = handler();
        let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let params = SyncParams::default().with_window(DateWindow::new(day, day).unwrap());

        let response = handler.handle(&Request::sync(params)).await;
        assert_eq!(response.as_error().unwrap().code, ErrorCode::InvalidRequest);
        assert_eq!(calendar.calls().list, 0);
    }

    #[tokio::test]
    async fn sync_status_reports_recent_passes() {
        let (handler, _, _) = handler();
        handler.handle(&Request::sync(year_2025())).await;
        handler.handle(&Request::sync(year_2025())).await;

        let response = handler.handle(&Request::sync_status(Some(1))).await;
        let Response::SyncStatus { report } = response else {
            panic!("expected SyncStatus, got {response:?}");
        };
        assert_eq!(report.recent.len(), 1);
        assert_eq!(report.recent[0].summary.skipped, 1);
        assert_eq!(report.last_24h.passes, 2);
        assert_eq!(report.last_24h.pushed, 1);
    }

    #[tokio::test]
    async fn request_handler_shutdown() {
        let (handler, _, state) = handler();
        assert_eq!(handler.handle(&Request::Shutdown).await, Response::Ok);
        assert!(state.read().await.shutdown_requested());
    }
}
