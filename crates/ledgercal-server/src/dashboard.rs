//! Dashboard cache invalidation after a sync pass.

use std::time::Duration;

use ledgercal_core::SyncSummary;
use ledgercal_providers::BoxFuture;
use serde::Serialize;
use tracing::debug;

/// Notified after every pass that produced a summary.
///
/// Invalidation is best effort: the orchestrator logs a failure and moves on.
pub trait DashboardInvalidator: Send + Sync {
    fn invalidate<'a>(
        &'a self,
        calendar_id: &'a str,
        summary: &'a SyncSummary,
    ) -> BoxFuture<'a, Result<(), String>>;
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

impl DashboardInvalidator for NoopInvalidator {
    fn invalidate<'a>(
        &'a self,
        _calendar_id: &'a str,
        _summary: &'a SyncSummary,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Serialize)]
struct InvalidationBody<'a> {
    calendar_id: &'a str,
    #[serde(flatten)]
    summary: &'a SyncSummary,
}

/// POSTs the pass summary as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpInvalidator {
    client: reqwest::Client,
    url: String,
}

impl HttpInvalidator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DashboardInvalidator for HttpInvalidator {
    fn invalidate<'a>(
        &'a self,
        calendar_id: &'a str,
        summary: &'a SyncSummary,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&InvalidationBody {
                    calendar_id,
                    summary,
                })
                .send()
                .await
                .map_err(|e| format!("request to {} failed: {e}", self.url))?;

            let status = response.status();
            if !status.is_success() {
                return Err(format!("{} answered {status}", self.url));
            }
            debug!(url = %self.url, "Dashboard invalidated");
            Ok(())
        })
    }
}
