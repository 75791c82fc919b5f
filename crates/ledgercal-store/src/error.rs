//! Errors raised while opening the database, and their mapping onto
//! [`StoreError`].

use ledgercal_core::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Errors opening or migrating the database.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot create database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },
}

/// Converts a rusqlite error, keeping constraint violations distinguishable.
pub(crate) fn to_store_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Constraint(msg.clone().unwrap_or_else(|| err.to_string()))
        }
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            StoreError::InvalidData(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

pub(crate) trait SqlResultExt<T> {
    fn store_err(self) -> Result<T, StoreError>;
}

impl<T> SqlResultExt<T> for Result<T, rusqlite::Error> {
    fn store_err(self) -> Result<T, StoreError> {
        self.map_err(to_store_error)
    }
}
