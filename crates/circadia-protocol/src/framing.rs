//! Newline framing for bus messages.
//!
//! A connection carries exactly one message: the UTF-8 text, a trailing
//! `\n`, then EOF. Readers cap what they accept at [`MAX_MESSAGE_SIZE`].
//!
//! ```text
//! +----------------------+----+
//! | kind[:payload]       | \n |
//! +----------------------+----+
//! ```

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::BusMessage;

/// Encodes a message as a newline-terminated line.
pub fn encode_line(message: &BusMessage) -> ProtocolResult<Vec<u8>> {
    let mut line = message.to_string().into_bytes();
    line.push(b'\n');

    if line.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: line.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    Ok(line)
}

/// Decodes the bytes read from one connection.
///
/// Only the first line is considered; anything after the first `\n` is
/// ignored.
pub fn decode_line(data: &[u8]) -> ProtocolResult<BusMessage> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let line = match data.iter().position(|b| *b == b'\n') {
        Some(end) => &data[..end],
        None => data,
    };

    std::str::from_utf8(line)?.parse()
}
