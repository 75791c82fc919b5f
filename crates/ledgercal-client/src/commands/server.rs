//! `ledgercal server`: runs the daemon in the foreground.
//!
//! Wires the SQLite store, the remote calendar, the orchestrator, the
//! background scheduler and the socket server together, then serves until
//! SIGTERM/SIGINT or a `Shutdown` request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use ledgercal_core::{PassOutcome, SyncTrigger};
use ledgercal_providers::{ErrorCalendar, ProviderError, RemoteCalendar};
use ledgercal_server::{
    HttpInvalidator, PassFailure, RequestHandler, Scheduler, ServerConfig, SharedState, ShutdownHandle,
    SocketServer, SyncDefaults, SyncOrchestrator, make_connection_handler, new_shared_state,
    pass_outcome,
};
use tracing::{info, warn};

use super::Context;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Blocks until shutdown.
pub async fn run(ctx: &Context) -> ClientResult<()> {
    let config = &ctx.config;
    let store = Arc::new(ctx.open_store()?);
    let calendar = build_calendar(config);
    info!(
        provider = calendar.name(),
        calendar_id = %config.google.calendar_id,
        database = %ctx.database_path.display(),
        "Starting daemon"
    );

    let mut orchestrator = SyncOrchestrator::new(store.clone(), calendar.clone())
        .with_config(config.orchestrator_config());
    if let Some(url) = &config.dashboard.invalidate_url {
        let dashboard =
            HttpInvalidator::new(url, Duration::from_secs(config.dashboard.timeout_secs))
                .map_err(ClientError::Config)?;
        info!(url = %dashboard.url(), "Dashboard invalidation enabled");
        orchestrator = orchestrator.with_dashboard(Arc::new(dashboard));
    }
    let orchestrator = Arc::new(orchestrator);

    let shutdown = ShutdownHandle::new();
    shutdown.listen_for_signals();

    let state = new_shared_state(calendar.name(), &config.google.calendar_id);

    let scheduler = if config.sync.background_enabled {
        let scheduler = Scheduler::new(config.scheduler_config());
        let handle = scheduler.handle();
        state.write().await.set_scheduler_handle(handle.clone());

        let defaults = config.background_defaults();
        let pass_orchestrator = orchestrator.clone();
        let pass_state = state.clone();
        let task = tokio::spawn(scheduler.run(move || {
            let orchestrator = pass_orchestrator.clone();
            let state = pass_state.clone();
            let defaults = defaults.clone();
            async move { scheduled_pass(&orchestrator, &state, &defaults).await }
        }));
        Some((handle, task))
    } else {
        info!("Background sync disabled");
        None
    };

    let server = SocketServer::new(ServerConfig::new(&ctx.socket_path)).await?;
    let handler = RequestHandler::new(state, orchestrator, store, config.sync_defaults());

    let wait = shutdown.clone();
    server
        .run_until_shutdown(make_connection_handler(handler, shutdown), async move {
            wait.wait().await
        })
        .await?;

    info!("Shutting down");
    if let Some((handle, task)) = scheduler {
        if let Err(e) = handle.stop().await {
            warn!(error = %e, "Failed to send stop command to scheduler");
        }
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            warn!("Scheduler did not stop within 5s");
        }
    }

    drop(server);
    info!("Daemon stopped");
    Ok(())
}

/// One background pass. Partial passes count as success for backoff; a
/// failed summary is treated as transient.
async fn scheduled_pass(
    orchestrator: &SyncOrchestrator,
    state: &SharedState,
    defaults: &SyncDefaults,
) -> Result<(), PassFailure> {
    let request = defaults
        .request(Local::now().date_naive(), SyncTrigger::Scheduled)
        .map_err(|e| PassFailure::permanent(e.to_string()))?;

    let result = orchestrator.unified_sync(request).await;
    state.write().await.record_pass(pass_outcome(&result));

    match result {
        Ok(summary) if summary.outcome() == PassOutcome::Failed => {
            Err(PassFailure::transient(summary.errors.join("; ")))
        }
        Ok(_) => Ok(()),
        Err(e) => Err(PassFailure::from(&e)),
    }
}

/// The configured backend, or one that reports why it is unavailable on
/// every pass.
#[cfg(feature = "google")]
fn build_calendar(config: &ClientConfig) -> Arc<dyn RemoteCalendar> {
    use ledgercal_providers::google::GoogleCalendar;

    let calendar = config
        .google
        .to_provider_config()
        .and_then(|google| GoogleCalendar::new(google).map_err(|e| e.to_string()));
    match calendar {
        Ok(calendar) => Arc::new(calendar),
        Err(e) => {
            warn!(error = %e, "Google Calendar is not usable; passes will fail until configured");
            Arc::new(ErrorCalendar::new("google", ProviderError::configuration(e)))
        }
    }
}

#[cfg(not(feature = "google"))]
fn build_calendar(_config: &ClientConfig) -> Arc<dyn RemoteCalendar> {
    warn!("Built without a calendar backend; passes will fail");
    Arc::new(ErrorCalendar::new(
        "none",
        ProviderError::configuration("no calendar backend compiled in (enable feature `google`)"),
    ))
}
