//! Google Calendar v3 backend.
//!
//! Talks to the REST API with a bearer token. Token acquisition is left to
//! the caller: the client config resolves it from a secret reference
//! (`pass::` or `env::`) and hands it over as a plain string.
//!
//! # Example
//!
//! ```ignore
//! use ledgercal_providers::google::{GoogleCalendar, GoogleConfig};
//!
//! let calendar = GoogleCalendar::new(GoogleConfig::new(token))?;
//! let events = calendar.list_events("primary", window).await?;
//! ```

mod calendar;
mod client;
mod config;

pub use calendar::GoogleCalendar;
pub use client::GoogleCalendarClient;
pub use config::GoogleConfig;
