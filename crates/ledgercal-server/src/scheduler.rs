//! Background scheduler for recurring passes.
//!
//! Runs the anniversary rollover pass on an interval, with:
//! - jitter so several daemons do not hit the provider in lockstep
//! - exponential backoff while passes keep failing transiently, and the
//!   longest backoff straight away for failures a retry cannot fix
//! - pause/resume and immediate-run commands over an mpsc queue

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::SyncError;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between passes.
    pub sync_interval: Duration,
    /// Maximum jitter as a fraction of the interval (0.0-1.0).
    pub jitter_fraction: f64,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Scheduled passes stop after this many failures in a row; a manual
    /// `run_now` still goes through.
    pub max_consecutive_failures: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(6 * 60 * 60),
            jitter_fraction: 0.1,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(60 * 60),
            backoff_multiplier: 2.0,
            max_consecutive_failures: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn new(sync_interval: Duration) -> Self {
        Self {
            sync_interval,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Interval plus or minus jitter.
    pub fn next_sync_delay(&self) -> Duration {
        let base = self.sync_interval.as_secs_f64();
        let jitter = rand_jitter(base * self.jitter_fraction);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }

    /// Delay after `consecutive_failures` failed passes.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(consecutive_failures - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// Value in [-range, range] derived from the clock's sub-second part.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let fraction = f64::from(nanos) / 1_000_000_000.0;
    (fraction * 2.0 - 1.0) * range
}

/// Why a scheduled pass failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassFailure {
    pub message: String,
    /// Whether retrying soon may succeed (network, rate limit, 5xx).
    pub retryable: bool,
}

impl PassFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<&SyncError> for PassFailure {
    fn from(error: &SyncError) -> Self {
        Self {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

impl std::fmt::Display for PassFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Commands that can be sent to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    RunNow,
    Pause,
    Resume,
    Stop,
}

/// Scheduler state.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub paused: bool,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// False once the latest failure was one a quick retry cannot fix.
    pub last_error_retryable: bool,
    /// When the next scheduled pass is due.
    pub next_run: Option<DateTime<Utc>>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
        self.last_attempt = self.last_success;
        self.last_error = None;
        self.last_error_retryable = false;
    }

    pub fn record_failure(&mut self, failure: PassFailure) {
        self.consecutive_failures += 1;
        self.last_attempt = Some(Utc::now());
        self.last_error_retryable = failure.retryable;
        self.last_error = Some(failure.message);
    }
}

pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

pub fn new_scheduler_state() -> SharedSchedulerState {
    Arc::new(RwLock::new(SchedulerState::new()))
}

/// Periodically runs a pass until stopped.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: new_scheduler_state(),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> SharedSchedulerState {
        self.state.clone()
    }

    /// Runs the loop; `sync_fn` reports why a pass failed.
    ///
    /// The first pass runs immediately. Returns on [`SchedulerCommand::Stop`]
    /// or once every handle is dropped.
    pub async fn run<F, Fut>(self, sync_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), PassFailure>> + Send,
    {
        let Self {
            config,
            state,
            command_tx,
            mut command_rx,
        } = self;
        // only handles keep the channel open
        drop(command_tx);

        info!(
            interval_secs = config.sync_interval.as_secs(),
            "Scheduler started"
        );

        run_pass(&config, &state, &sync_fn, false).await;

        loop {
            let delay = next_delay(&config, &state).await;
            state.write().await.next_run = chrono::Duration::from_std(delay)
                .ok()
                .map(|d| Utc::now() + d);
            debug!(delay_secs = delay.as_secs(), "Scheduling next pass");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if state.read().await.paused {
                        debug!("Scheduler paused, skipping pass");
                        continue;
                    }
                    run_pass(&config, &state, &sync_fn, false).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::RunNow) => {
                            debug!("Received RunNow command");
                            run_pass(&config, &state, &sync_fn, true).await;
                        }
                        Some(SchedulerCommand::Pause) => {
                            info!("Scheduler paused");
                            state.write().await.paused = true;
                        }
                        Some(SchedulerCommand::Resume) => {
                            info!("Scheduler resumed");
                            state.write().await.paused = false;
                        }
                        Some(SchedulerCommand::Stop) | None => {
                            info!("Scheduler stopping");
                            break;
                        }
                    }
                }
            }
        }

        state.write().await.next_run = None;
    }
}

async fn next_delay(config: &SchedulerConfig, state: &SharedSchedulerState) -> Duration {
    let (failures, retryable) = {
        let state = state.read().await;
        (state.consecutive_failures, state.last_error_retryable)
    };
    if failures > 0 && !retryable {
        debug!(
            failures,
            backoff_secs = config.max_backoff.as_secs(),
            "Last failure is not retryable, using max backoff"
        );
        return config.max_backoff;
    }
    if failures > 0 {
        let backoff = config.backoff_delay(failures);
        debug!(
            failures,
            backoff_secs = backoff.as_secs(),
            "Using backoff delay"
        );
        return backoff;
    }
    config.next_sync_delay()
}

async fn run_pass<F, Fut>(
    config: &SchedulerConfig,
    state: &SharedSchedulerState,
    sync_fn: &F,
    manual: bool,
) where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<(), PassFailure>>,
{
    let failures = state.read().await.consecutive_failures;
    if !manual && failures >= config.max_consecutive_failures {
        error!(
            failures,
            max = config.max_consecutive_failures,
            "Max consecutive failures reached, skipping scheduled pass"
        );
        return;
    }

    match sync_fn().await {
        Ok(()) => {
            debug!("Scheduled pass succeeded");
            state.write().await.record_success();
        }
        Err(failure) => {
            warn!(error = %failure, retryable = failure.retryable, "Scheduled pass failed");
            state.write().await.record_failure(failure);
        }
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    pub async fn run_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::RunNow).await
    }

    pub async fn pause(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Resume).await
    }

    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }

    /// When the next scheduled pass is due, unless paused or stopped.
    pub async fn next_run(&self) -> Option<DateTime<Utc>> {
        let state = self.state.read().await;
        if state.paused { None } else { state.next_run }
    }
}
