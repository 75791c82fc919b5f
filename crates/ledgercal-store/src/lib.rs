//! SQLite persistence for the calendar reconciliation engine.
//!
//! [`SqliteStore`] implements every storage trait of `ledgercal-core`:
//! [`EventStore`](ledgercal_core::EventStore),
//! [`TombstoneTracker`](ledgercal_core::TombstoneTracker),
//! [`CompanyDirectory`](ledgercal_core::CompanyDirectory) and
//! [`SyncLog`](ledgercal_core::SyncLog).
//!
//! The tombstone primary key is the durable serialization point for pushes:
//! whatever two processes race on, only one row per logical id exists.

mod companies;
mod error;
mod events;
pub mod migrations;
mod sync_log;
mod tombstones;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use ledgercal_core::{StoreError, StoreResult};
use rusqlite::Connection;
use tracing::{error, info};

pub use error::{DbError, DbResult};

/// A SQLite-backed store.
///
/// The connection is guarded by a mutex; every trait method holds it for the
/// duration of one statement or one transaction.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (creating if needed) a database file and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let started_at = Instant::now();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|err| {
            error!(path = %path.display(), error = %err, "Failed to open database");
            DbError::from(err)
        })?;
        let store = Self::bootstrap(conn, Some(path.to_path_buf()))?;

        info!(
            path = %path.display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Opened database"
        );
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?, None)
    }

    fn bootstrap(mut conn: Connection, path: Option<PathBuf>) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::database("sqlite connection lock poisoned"))
    }
}

// Fixed-width UTC text so that string comparison in SQL orders by time.
pub(crate) fn encode_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {raw:?}: {e}")))
}
