//! The reconciliation pass.
//!
//! [`SyncOrchestrator::unified_sync`] runs one pass over a date window:
//!
//! 1. collect local candidates, generate anniversaries and resolve overrides
//! 2. list the remote calendar once
//! 3. skip, link or push every candidate
//! 4. for full passes, pull unknown remote events, propagate local deletions
//!    and tombstone what disappeared remotely
//!
//! Every per-item failure lands in the summary's `errors`. Only an
//! authentication failure aborts the pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use ledgercal_core::{
    CalendarEvent, CandidateKey, CompanyDirectory, DateWindow, Decision, EventId, EventQuery,
    EventStore, LogicalId, NewCalendarEvent, NewRemoteEvent, NewSyncLogEntry, PassOutcome,
    RemoteEvent, RemoteIndex, StoreResult, SyncCandidate, SyncLog, SyncStatus, SyncSummary,
    SyncTrigger, SyncType, TombstoneTracker, decide, generate, resolve,
};
use ledgercal_providers::{ProviderError, RemoteCalendar};
use tracing::{debug, info, warn};

use crate::dashboard::{DashboardInvalidator, NoopInvalidator};
use crate::error::SyncError;
use crate::locks::KeyedLocks;

/// Tuning of the pass.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Candidate decisions in flight at once. 1 keeps the pass sequential.
    pub max_concurrent_pushes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pushes: 1,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_concurrent_pushes(mut self, max: usize) -> Self {
        self.max_concurrent_pushes = max.max(1);
        self
    }
}

/// Parameters of one pass with every default already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub calendar_id: String,
    pub sync_type: SyncType,
    pub include_anniversary_events: bool,
    pub window: DateWindow,
    pub trigger: SyncTrigger,
}

impl SyncRequest {
    pub fn new(calendar_id: impl Into<String>, window: DateWindow) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            sync_type: SyncType::All,
            include_anniversary_events: true,
            window,
            trigger: SyncTrigger::Manual,
        }
    }

    pub fn with_sync_type(mut self, sync_type: SyncType) -> Self {
        self.sync_type = sync_type;
        self
    }

    pub fn with_anniversaries(mut self, include: bool) -> Self {
        self.include_anniversary_events = include;
        self
    }

    pub fn with_trigger(mut self, trigger: SyncTrigger) -> Self {
        self.trigger = trigger;
        self
    }
}

/// A pass cut short by the remote calendar rejecting our credentials.
struct Aborted {
    partial: SyncSummary,
    error: ProviderError,
}

/// How one candidate ended.
enum CandidateOutcome {
    Skipped,
    Linked,
    Pushed,
    Failed(String),
    Auth(ProviderError),
}

struct CandidateResult {
    /// Remote event this candidate now owns.
    touched: Option<String>,
    outcome: CandidateOutcome,
    /// Remote copy of an overridden occurrence deleted on the way.
    superseded: Option<String>,
}

impl CandidateResult {
    fn new(touched: Option<String>, outcome: CandidateOutcome) -> Self {
        Self {
            touched,
            outcome,
            superseded: None,
        }
    }
}

/// Read-only state shared by the candidate tasks of one pass.
struct PassContext<'a> {
    calendar_id: &'a str,
    index: &'a RemoteIndex,
    /// Remote events owned by some logical event, never linked again.
    claimed: Mutex<HashSet<String>>,
}

impl PassContext<'_> {
    fn claimed(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reconciles the local store with a remote calendar.
pub struct SyncOrchestrator {
    events: Arc<dyn EventStore>,
    tracker: Arc<dyn TombstoneTracker>,
    companies: Arc<dyn CompanyDirectory>,
    log: Arc<dyn SyncLog>,
    calendar: Arc<dyn RemoteCalendar>,
    dashboard: Arc<dyn DashboardInvalidator>,
    config: OrchestratorConfig,
    locks: KeyedLocks,
}

impl SyncOrchestrator {
    /// Builds an orchestrator over a single store implementing every
    /// persistence trait.
    pub fn new<S>(store: Arc<S>, calendar: Arc<dyn RemoteCalendar>) -> Self
    where
        S: EventStore + TombstoneTracker + CompanyDirectory + SyncLog + 'static,
    {
        Self {
            events: store.clone(),
            tracker: store.clone(),
            companies: store.clone(),
            log: store,
            calendar,
            dashboard: Arc::new(NoopInvalidator),
            config: OrchestratorConfig::default(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_dashboard(mut self, dashboard: Arc<dyn DashboardInvalidator>) -> Self {
        self.dashboard = dashboard;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares the per-key locks with another orchestrator over the same store.
    pub fn with_locks(mut self, locks: KeyedLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    pub fn calendar_name(&self) -> &str {
        self.calendar.name()
    }

    /// Runs one reconciliation pass.
    ///
    /// Returns a summary for every pass except one aborted by an
    /// authentication failure. Both are appended to the sync log.
    #[tracing::instrument(
        skip(self, request),
        fields(
            calendar_id = %request.calendar_id,
            sync_type = %request.sync_type,
            window = %request.window,
            trigger = request.trigger.as_str(),
        )
    )]
    pub async fn unified_sync(&self, request: SyncRequest) -> Result<SyncSummary, SyncError> {
        let started_at = Utc::now();

        match self.run_pass(&request).await {
            Ok(summary) => {
                info!(
                    pushed = summary.pushed,
                    pulled = summary.pulled,
                    deleted = summary.deleted,
                    skipped = summary.skipped,
                    errors = summary.errors.len(),
                    "Sync pass finished"
                );
                self.append_log(NewSyncLogEntry::from_summary(
                    &request.calendar_id,
                    request.trigger,
                    started_at,
                    summary.clone(),
                ));
                if let Err(e) = self
                    .dashboard
                    .invalidate(&request.calendar_id, &summary)
                    .await
                {
                    warn!(error = %e, "Dashboard invalidation failed");
                }
                Ok(summary)
            }
            Err(Aborted { mut partial, error }) => {
                warn!(error = %error, "Sync pass aborted: authentication failed");
                partial.push_error(error.to_string());
                self.append_log(
                    NewSyncLogEntry::from_summary(
                        &request.calendar_id,
                        request.trigger,
                        started_at,
                        partial,
                    )
                    .with_outcome(PassOutcome::Failed),
                );
                Err(SyncError::Auth(error))
            }
        }
    }

    fn append_log(&self, entry: NewSyncLogEntry) {
        if let Err(e) = self.log.append_entry(&entry) {
            warn!(error = %e, "Failed to append sync log entry");
        }
    }

    async fn run_pass(&self, request: &SyncRequest) -> Result<SyncSummary, Aborted> {
        let mut summary = SyncSummary::new(request.sync_type);

        let candidates = match self.collect(request, &mut summary) {
            Ok(candidates) => candidates,
            Err(e) => {
                summary.push_error(format!("failed to collect candidates: {e}"));
                return Ok(summary);
            }
        };

        let remote = match self
            .calendar
            .list_events(&request.calendar_id, request.window)
            .await
        {
            Ok(events) => events,
            Err(error) if error.is_auth() => {
                return Err(Aborted {
                    partial: summary,
                    error,
                });
            }
            Err(e) => {
                summary.push_error(format!("failed to list remote events: {e}"));
                return Ok(summary);
            }
        };
        let index = RemoteIndex::new(remote);
        debug!(
            candidates = candidates.len(),
            remote = index.len(),
            "Remote snapshot taken"
        );

        let full = request.sync_type == SyncType::All;

        // tracked occurrences deleted remotely are tombstoned, not re-pushed
        let (vanished, candidates): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| {
            full && matches!(c.key, CandidateKey::Generated(_))
                && c
                    .external_id
                    .as_deref()
                    .is_some_and(|ext| !index.contains_external_id(ext))
        });

        let ctx = PassContext {
            calendar_id: &request.calendar_id,
            index: &index,
            claimed: Mutex::new(self.claimed_external_ids(&request.window, &mut summary)),
        };

        let mut touched = HashSet::new();
        let mut results = stream::iter(candidates)
            .map(|candidate| self.process_candidate(&ctx, candidate))
            .buffer_unordered(self.config.max_concurrent_pushes.max(1));

        while let Some(result) = results.next().await {
            if let Some(ext) = result.touched {
                touched.insert(ext);
            }
            if let Some(stale) = result.superseded {
                touched.insert(stale);
                summary.deleted += 1;
            }
            match result.outcome {
                CandidateOutcome::Skipped | CandidateOutcome::Linked => summary.skipped += 1,
                CandidateOutcome::Pushed => summary.pushed += 1,
                CandidateOutcome::Failed(error) => summary.push_error(error),
                CandidateOutcome::Auth(error) => {
                    return Err(Aborted {
                        partial: summary,
                        error,
                    });
                }
            }
        }
        drop(results);

        if full {
            self.reconcile_remote(&ctx, &touched, &mut summary).await?;
            self.tombstone_stale(request, &index, &touched, &mut summary);
            for candidate in vanished {
                self.tombstone_vanished(&candidate, &mut summary);
            }
        }

        Ok(summary)
    }

    /// Local events plus generated occurrences, overrides and tombstones
    /// applied.
    fn collect(
        &self,
        request: &SyncRequest,
        summary: &mut SyncSummary,
    ) -> StoreResult<Vec<SyncCandidate>> {
        let in_window = self
            .events
            .list_events(&EventQuery::live().in_window(request.window))?;
        let overrides = self.events.list_events(&EventQuery::live().overrides_only())?;
        let local = merge_by_id(in_window, overrides);

        let generated = if request.include_anniversary_events {
            generate(&self.companies.list_companies()?, &request.window)
        } else {
            Vec::new()
        };

        let mut outcome = resolve(&local, generated, request.sync_type, self.tracker.as_ref())?;
        for logical_id in &outcome.duplicates {
            summary.push_error(format!("duplicate candidate skipped: {logical_id}"));
        }

        // out-of-window overrides only suppress their occurrence
        outcome
            .candidates
            .retain(|candidate| request.window.contains(candidate.date));
        Ok(outcome.candidates)
    }

    /// External ids already owned by a tombstone or a local event.
    fn claimed_external_ids(&self, window: &DateWindow, summary: &mut SyncSummary) -> HashSet<String> {
        let mut claimed = HashSet::new();
        match self.tracker.list_tombstones() {
            Ok(tombstones) => claimed.extend(tombstones.into_iter().filter_map(|t| t.external_id)),
            Err(e) => summary.push_error(format!("failed to list tombstones: {e}")),
        }
        let query = EventQuery::live().in_window(*window).including_deleted();
        match self.events.list_events(&query) {
            Ok(events) => claimed.extend(events.into_iter().filter_map(|e| e.external_id)),
            Err(e) => summary.push_error(format!("failed to list local events: {e}")),
        }
        claimed
    }

    async fn process_candidate(
        &self,
        ctx: &PassContext<'_>,
        candidate: SyncCandidate,
    ) -> CandidateResult {
        let title = candidate.display_title();

        if let Some(ext) = &candidate.external_id {
            debug!(candidate = %candidate.key, external_id = %ext, "Already synced");
            return CandidateResult::new(Some(ext.clone()), CandidateOutcome::Skipped);
        }

        let _guard = self.locks.lock(&candidate.tombstone_key).await;

        // another pass may have pushed this key while we waited
        let mut superseded = None;
        match self.tracker.get_tombstone(&candidate.tombstone_key) {
            Ok(Some(tombstone)) if tombstone.is_deleted => {
                debug!(candidate = %candidate.key, "Tombstoned during pass");
                return CandidateResult::new(None, CandidateOutcome::Skipped);
            }
            Ok(Some(tombstone)) => {
                if let Some(ext) = tombstone.external_id {
                    ctx.claimed().insert(ext.clone());
                    match self.supersedes(&candidate, &ext) {
                        Ok(false) => return self.link(&candidate, ext),
                        Ok(true) => match self.remove_superseded(ctx, &candidate, ext).await {
                            Ok(removed) => superseded = removed,
                            Err(result) => return result,
                        },
                        Err(e) => {
                            return CandidateResult::new(
                                None,
                                CandidateOutcome::Failed(format!(
                                    "event lookup failed for {title}: {e}"
                                )),
                            );
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                return CandidateResult::new(
                    None,
                    CandidateOutcome::Failed(format!("tombstone lookup failed for {title}: {e}")),
                );
            }
        }

        let decision = {
            let mut claimed = ctx.claimed();
            let decision = decide(&candidate, ctx.index, &claimed);
            if let Decision::Link(ext) = &decision {
                claimed.insert(ext.clone());
            }
            decision
        };

        let mut result = match decision {
            Decision::AlreadySynced(ext) => {
                CandidateResult::new(Some(ext), CandidateOutcome::Skipped)
            }
            Decision::Link(ext) => self.link(&candidate, ext),
            Decision::Push => self.push(ctx, &candidate, title).await,
        };
        result.superseded = superseded;
        result
    }

    /// True when `ext` is the pushed copy of the generated occurrence this
    /// override replaces, rather than the override's own remote event.
    fn supersedes(&self, candidate: &SyncCandidate, ext: &str) -> StoreResult<bool> {
        let Some(id) = candidate.persisted_id() else {
            return Ok(false);
        };
        if !candidate.tombstone_key.is_anniversary() {
            return Ok(false);
        }
        let owned = self
            .events
            .get_event(id)?
            .and_then(|event| event.external_id);
        Ok(owned.as_deref() != Some(ext))
    }

    /// Deletes the generated copy an override replaces. Returns its external
    /// id when it was still on the remote calendar.
    ///
    /// On failure the override is not pushed, so the next pass retries with
    /// the tombstone still pointing at the old copy.
    async fn remove_superseded(
        &self,
        ctx: &PassContext<'_>,
        candidate: &SyncCandidate,
        stale: String,
    ) -> Result<Option<String>, CandidateResult> {
        if !ctx.index.contains_external_id(&stale) {
            debug!(candidate = %candidate.key, external_id = %stale, "Superseded copy already gone");
            return Ok(None);
        }
        match self.calendar.delete_event(ctx.calendar_id, &stale).await {
            Ok(()) => {
                debug!(candidate = %candidate.key, external_id = %stale, "Deleted superseded remote copy");
                Ok(Some(stale))
            }
            Err(error) if error.is_auth() => {
                Err(CandidateResult::new(None, CandidateOutcome::Auth(error)))
            }
            Err(e) => {
                let message = format!(
                    "failed to delete superseded copy of {}: {e}",
                    candidate.display_title()
                );
                Err(CandidateResult::new(Some(stale), CandidateOutcome::Failed(message)))
            }
        }
    }

    fn link(&self, candidate: &SyncCandidate, ext: String) -> CandidateResult {
        match self.record(candidate, &ext) {
            Ok(()) => {
                debug!(candidate = %candidate.key, external_id = %ext, "Linked to existing remote event");
                CandidateResult::new(Some(ext), CandidateOutcome::Linked)
            }
            Err(e) => {
                let message = format!(
                    "failed to link {} to {ext}: {e}",
                    candidate.display_title()
                );
                CandidateResult::new(Some(ext), CandidateOutcome::Failed(message))
            }
        }
    }

    async fn push(
        &self,
        ctx: &PassContext<'_>,
        candidate: &SyncCandidate,
        title: String,
    ) -> CandidateResult {
        let ext = match self
            .calendar
            .create_event(ctx.calendar_id, NewRemoteEvent::from(candidate))
            .await
        {
            Ok(ext) => ext,
            Err(error) if error.is_auth() => {
                return CandidateResult::new(None, CandidateOutcome::Auth(error));
            }
            Err(e) => {
                warn!(candidate = %candidate.key, error = %e, "Create failed");
                return CandidateResult::new(
                    None,
                    CandidateOutcome::Failed(format!("create failed for {title}: {e}")),
                );
            }
        };

        ctx.claimed().insert(ext.clone());
        match self.record(candidate, &ext) {
            Ok(()) => {
                debug!(candidate = %candidate.key, external_id = %ext, "Pushed");
                CandidateResult::new(Some(ext), CandidateOutcome::Pushed)
            }
            Err(e) => {
                let message = format!("created {title} as {ext} but failed to record it: {e}");
                CandidateResult::new(Some(ext), CandidateOutcome::Failed(message))
            }
        }
    }

    /// Persists a candidate's remote identity.
    fn record(&self, candidate: &SyncCandidate, ext: &str) -> StoreResult<()> {
        if let Some(id) = candidate.persisted_id() {
            self.events.mark_synced(id, ext, Utc::now())?;
        }
        self.tracker.record_synced(&candidate.tombstone_key, ext)
    }

    /// Deletes remotely what was deleted locally and pulls what nobody owns.
    async fn reconcile_remote(
        &self,
        ctx: &PassContext<'_>,
        touched: &HashSet<String>,
        summary: &mut SyncSummary,
    ) -> Result<(), Aborted> {
        for remote in ctx.index.events() {
            if touched.contains(&remote.external_id) {
                continue;
            }

            match self.tracker.find_by_external_id(&remote.external_id) {
                Ok(Some(tombstone)) if tombstone.is_deleted => {
                    match self
                        .calendar
                        .delete_event(ctx.calendar_id, &remote.external_id)
                        .await
                    {
                        Ok(()) => {
                            debug!(logical_id = %tombstone.logical_id, external_id = %remote.external_id, "Deleted remote event");
                            summary.deleted += 1;
                        }
                        Err(error) if error.is_auth() => {
                            return Err(Aborted {
                                partial: std::mem::take(summary),
                                error,
                            });
                        }
                        Err(e) => summary
                            .push_error(format!("delete failed for {}: {e}", remote.title)),
                    }
                    continue;
                }
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    summary.push_error(format!("tombstone lookup failed for {}: {e}", remote.title));
                    continue;
                }
            }

            match EventStore::find_by_external_id(self.events.as_ref(), &remote.external_id) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    summary.push_error(format!("event lookup failed for {}: {e}", remote.title));
                    continue;
                }
            }

            match self.pull(remote) {
                Ok(id) => {
                    debug!(event_id = %id, external_id = %remote.external_id, "Pulled remote event");
                    summary.pulled += 1;
                }
                Err(e) => summary.push_error(format!("pull failed for {}: {e}", remote.title)),
            }
        }
        Ok(())
    }

    fn pull(&self, remote: &RemoteEvent) -> StoreResult<EventId> {
        let event = self.events.insert_event(NewCalendarEvent::pulled(
            &remote.title,
            remote.start.date(),
            remote.description.clone(),
            &remote.external_id,
        ))?;
        self.tracker
            .record_synced(&LogicalId::for_event(event.id), &remote.external_id)?;
        Ok(event.id)
    }

    /// Soft-deletes synced local events whose remote copy is gone.
    fn tombstone_stale(
        &self,
        request: &SyncRequest,
        index: &RemoteIndex,
        touched: &HashSet<String>,
        summary: &mut SyncSummary,
    ) {
        let query = EventQuery::live()
            .in_window(request.window)
            .with_statuses([SyncStatus::Synced]);
        let synced = match self.events.list_events(&query) {
            Ok(events) => events,
            Err(e) => {
                summary.push_error(format!("failed to list synced events: {e}"));
                return;
            }
        };

        for event in synced {
            let Some(ext) = event.external_id.as_deref() else {
                continue;
            };
            if index.contains_external_id(ext) || touched.contains(ext) {
                continue;
            }
            let key = event.tombstone_key();
            match self.tracker.is_deleted(&key) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    summary.push_error(format!("tombstone lookup failed for {key}: {e}"));
                    continue;
                }
            }
            let result = self
                .events
                .mark_deleted(event.id)
                .and_then(|()| self.tracker.record_deleted(&key));
            match result {
                Ok(()) => {
                    debug!(event_id = %event.id, external_id = %ext, "Remote copy gone, tombstoned");
                    summary.deleted += 1;
                }
                Err(e) => summary.push_error(format!(
                    "failed to tombstone {}: {e}",
                    event.display_title()
                )),
            }
        }
    }

    fn tombstone_vanished(&self, candidate: &SyncCandidate, summary: &mut SyncSummary) {
        match self.tracker.record_deleted(&candidate.tombstone_key) {
            Ok(()) => {
                debug!(logical_id = %candidate.tombstone_key, "Remote anniversary gone, tombstoned");
                summary.deleted += 1;
            }
            Err(e) => summary.push_error(format!(
                "failed to tombstone {}: {e}",
                candidate.tombstone_key
            )),
        }
    }
}

fn merge_by_id(first: Vec<CalendarEvent>, second: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    let mut by_id: HashMap<EventId, CalendarEvent> = HashMap::with_capacity(first.len());
    for event in first.into_iter().chain(second) {
        by_id.entry(event.id).or_insert(event);
    }
    let mut merged: Vec<_> = by_id.into_values().collect();
    merged.sort_by_key(|e| (e.date, e.id));
    merged
}
