//! Daemon: sync orchestrator, IPC server, scheduler.
//!
//! This crate provides the ledgercal daemon that handles:
//! - the reconciliation pass ([`SyncOrchestrator::unified_sync`])
//! - Unix socket IPC for `Sync` and `SyncStatus` requests
//! - a background scheduler for the anniversary rollover
//! - best-effort dashboard invalidation after each pass
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ledgercal_core::{DateWindow, MemoryStore};
//! use ledgercal_providers::MemoryCalendar;
//! use ledgercal_server::{SyncOrchestrator, SyncRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let orchestrator = SyncOrchestrator::new(store, Arc::new(MemoryCalendar::new()));
//!
//!     let window = DateWindow::year(2025).ok_or("bad year")?;
//!     let summary = orchestrator
//!         .unified_sync(SyncRequest::new("primary", window))
//!         .await?;
//!     println!("pushed {}", summary.pushed);
//!     Ok(())
//! }
//! ```

mod config;
mod dashboard;
mod error;
mod handler;
mod locks;
mod orchestrator;
mod scheduler;
mod shutdown;
mod socket;

pub use config::{ServerConfig, SyncDefaults, default_socket_path};
pub use dashboard::{DashboardInvalidator, HttpInvalidator, NoopInvalidator};
pub use error::{ServerError, ServerResult, SyncError};
pub use handler::{
    DEFAULT_STATUS_LIMIT, MAX_STATUS_LIMIT, RequestHandler, ServerState, SharedState,
    make_connection_handler, new_shared_state, pass_outcome,
};
pub use locks::KeyedLocks;
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator, SyncRequest};
pub use scheduler::{
    PassFailure, Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle, SchedulerState,
    SharedSchedulerState, new_scheduler_state,
};
pub use shutdown::ShutdownHandle;
pub use socket::{Connection, SocketServer};
