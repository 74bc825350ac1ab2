//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while parsing or framing bus messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds the per-connection read limit.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Nothing but whitespace was received.
    #[error("empty message")]
    EmptyMessage,

    /// Bytes were not valid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The `kind` part is not one the bus knows about.
    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    /// The kind requires a payload but none was given.
    #[error("message {kind:?} requires a payload")]
    MissingPayload { kind: &'static str },

    /// The kind takes no payload but one was given.
    #[error("message {kind:?} takes no payload (got {payload:?})")]
    UnexpectedPayload { kind: &'static str, payload: String },

    /// The payload does not parse for this kind.
    #[error("invalid payload for {kind:?}: {payload:?}")]
    InvalidPayload { kind: &'static str, payload: String },

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("timeout during {operation}")]
    Timeout { operation: String },
}
