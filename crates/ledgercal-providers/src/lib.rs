//! RemoteCalendar trait and implementations.
//!
//! This crate provides the abstraction layer over the external calendar the
//! local store is reconciled against:
//!
//! - [`RemoteCalendar`] - list/create/delete capability used by the sync engine
//! - [`ProviderError`] - Error types for provider operations
//! - [`MemoryCalendar`] - In-memory backend with failure injection
//! - `google::GoogleCalendar` - Google Calendar v3 backend (feature `google`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐
//! │  Google API     │    │  Vec in memory  │
//! └────────┬────────┘    └────────┬────────┘
//!          │                      │
//!          ▼                      ▼
//! ┌─────────────────┐    ┌─────────────────┐
//! │ GoogleCalendar  │    │ MemoryCalendar  │
//! └────────┬────────┘    └────────┬────────┘
//!          │    RemoteCalendar    │
//!          └──────────┬───────────┘
//!                     ▼
//!              ┌──────────────┐
//!              │ RemoteEvent  │
//!              └──────────────┘
//! ```

pub mod calendar;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod memory;

pub use calendar::{BoxFuture, ErrorCalendar, RemoteCalendar};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use ledgercal_core::{NewRemoteEvent, RemoteEvent};
pub use memory::{CallCounts, MemoryCalendar};
