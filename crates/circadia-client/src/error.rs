//! Client error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use circadia_core::TracingError;
use circadia_protocol::ProtocolError;
use circadia_server::{AudioError, ServerError};
use circadia_store::StoreError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A command-line value the store would not accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No daemon listens on the bus socket.
    #[error("daemon not reachable at {}: {source}", path.display())]
    DaemonUnreachable {
        path: PathBuf,
        #[source]
        source: ServerError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    /// The daemon failed to start or stopped with an error.
    #[error("daemon error: {0}")]
    Server(#[from] ServerError),

    #[error("logging setup failed: {0}")]
    Tracing(#[from] TracingError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Wraps a failed publish.
    pub fn unreachable(path: impl Into<PathBuf>, source: ServerError) -> Self {
        Self::DaemonUnreachable {
            path: path.into(),
            source,
        }
    }
}
