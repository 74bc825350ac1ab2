//! Event bus message grammar and framing for circadia.
//!
//! Any local process can talk to the daemon by connecting to its socket,
//! writing one `kind[:payload]` line and closing the connection. The daemon
//! itself uses the same channel to announce state changes.
//!
//! ```rust
//! use circadia_protocol::{BusMessage, decode_line, encode_line};
//!
//! let bytes = encode_line(&BusMessage::SleepModeChanged(true)).unwrap();
//! assert_eq!(decode_line(&bytes).unwrap(), BusMessage::SleepModeChanged(true));
//! ```

mod error;
mod framing;
mod message;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{decode_line, encode_line};
pub use message::BusMessage;

/// Maximum bytes read from a single bus connection.
pub const MAX_MESSAGE_SIZE: usize = 1024;
