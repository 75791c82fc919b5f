//! Subcommand implementations.
//!
//! `sync` and `status` talk to the daemon; `events`, `anniversaries` and
//! `companies` work on the SQLite database directly.

pub mod anniversaries;
pub mod companies;
pub mod config;
pub mod events;
pub mod server;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use ledgercal_store::SqliteStore;
use serde::Serialize;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::socket::SocketClient;

/// Configuration with command-line overrides applied.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ClientConfig,
    pub socket_path: PathBuf,
    pub database_path: PathBuf,
    pub timeout: Duration,
}

impl Context {
    pub fn new(cli: &Cli, config: ClientConfig) -> Self {
        Self {
            socket_path: cli.socket_path.clone().unwrap_or_else(|| config.socket_path()),
            database_path: cli.database.clone().unwrap_or_else(|| config.database_path()),
            timeout: Duration::from_secs(cli.timeout.unwrap_or(config.server.timeout)),
            config,
        }
    }

    pub fn client(&self) -> SocketClient {
        SocketClient::new(&self.socket_path, self.timeout)
    }

    pub fn open_store(&self) -> ClientResult<SqliteStore> {
        Ok(SqliteStore::open(&self.database_path)?)
    }

    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> ClientResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{json}");
    Ok(())
}
