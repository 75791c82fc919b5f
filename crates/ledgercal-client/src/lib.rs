//! The `ledgercal` command-line client.
//!
//! Sync passes run inside the daemon (`ledgercal server`) and are requested
//! over its Unix socket; local records are edited directly in the SQLite
//! database the daemon reads.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;
pub mod socket;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use socket::SocketClient;
