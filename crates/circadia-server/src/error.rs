//! Daemon error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for daemon operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result type for audio playback and routing.
pub type AudioResult<T> = Result<T, AudioError>;

/// Errors that can occur in the daemon.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (socket, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Bus message could not be framed or parsed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] circadia_protocol::ProtocolError),

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(#[from] circadia_store::StoreError),

    /// Playback or routing failure.
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// A live daemon already answers on the socket.
    #[error("Socket path already in use: {path}")]
    SocketInUse { path: String },

    /// Socket path parent directory does not exist.
    #[error("Socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a socket in use error.
    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    /// Creates a socket path invalid error.
    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }
}

/// Errors from the audio assurance subsystem.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The output device could not be opened.
    #[error("audio device unavailable: {0}")]
    Device(String),

    /// The sound file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The sound file could not be decoded.
    #[error("cannot decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// No sound file to play.
    #[error("no alarm sound found")]
    NoSound,

    /// None of the audio server endpoints accepted a connection.
    #[error("audio server unreachable (tried: {})", tried.join(", "))]
    ServerUnreachable { tried: Vec<String> },

    /// An audio server command failed.
    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },

    /// The audio server returned output we could not parse.
    #[error("unexpected audio server output: {0}")]
    Parse(#[from] serde_json::Error),

    /// The audio server reported no sinks.
    #[error("no output sink available")]
    NoSink,
}

impl AudioError {
    /// Creates a command failure error.
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }
}
