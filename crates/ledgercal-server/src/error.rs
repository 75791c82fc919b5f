//! Server error types.

use std::io;

use ledgercal_providers::ProviderError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by the socket server and request loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ledgercal_protocol::ProtocolError),

    #[error("Socket path already in use: {path}")]
    SocketInUse { path: String },

    #[error("Socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Server shutdown requested")]
    Shutdown,
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }
}

/// Why a reconciliation pass produced no summary.
///
/// Every other failure is reported inside the summary's `errors`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote calendar rejected our credentials.
    #[error("remote calendar authentication failed: {0}")]
    Auth(ProviderError),
}

impl SyncError {
    /// Whether running the pass again soon may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Auth(error) => error.is_retryable(),
        }
    }
}
