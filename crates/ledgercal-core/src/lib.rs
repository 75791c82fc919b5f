//! Core types: events, date windows, anniversaries, override resolution,
//! candidate matching and the persistence traits the sync engine runs on.

pub mod anniversary;
pub mod event;
pub mod matching;
pub mod memory;
pub mod remote;
pub mod resolver;
pub mod store;
pub mod sync_log;
pub mod time;
pub mod tracing;

pub use anniversary::{GeneratedOccurrence, anniversary_title, company_slug, generate};
pub use event::{
    CalendarEvent, Company, EventId, EventType, LogicalId, NewCalendarEvent, SyncStatus, SyncType,
};
pub use matching::{Decision, RemoteIndex, decide};
pub use memory::MemoryStore;
pub use remote::{NewRemoteEvent, RemoteEvent};
pub use resolver::{CandidateKey, ResolveOutcome, SyncCandidate, resolve};
pub use store::{
    CompanyDirectory, EventQuery, EventStore, EventUpdate, LocalDeletion, StoreError, StoreResult,
    SyncLog, SyncTombstone, TombstoneTracker, delete_local_event,
};
pub use sync_log::{
    NewSyncLogEntry, PassOutcome, SyncLogCounts, SyncLogEntry, SyncStatusReport, SyncSummary,
    SyncTrigger,
};
pub use time::{DateWindow, EventTime, WindowError};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
