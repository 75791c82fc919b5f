//! Client error types.

use ledgercal_core::StoreError;
use ledgercal_protocol::{ErrorResponse, ProtocolError};
use ledgercal_store::DbError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The daemon answered with an error response.
    #[error("server error ({}): {}", .0.code.description(), .0.message)]
    Server(ErrorResponse),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("daemon error: {0}")]
    Daemon(#[from] ledgercal_server::ServerError),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
