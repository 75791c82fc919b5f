//! Length-prefixed JSON framing.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! Socket code reads the 4-byte header, validates it with [`frame_len`],
//! reads exactly that many bytes and hands them to [`decode_payload`].

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Serializes `message` and prepends its length.
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = u32::try_from(json.len())
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_SIZE)
        .ok_or(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        })?;

    let mut buffer = Vec::with_capacity(HEADER_LEN + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Validates a length prefix and returns the payload size it announces.
pub fn frame_len(header: [u8; HEADER_LEN]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(header);
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len as usize,
            max: MAX_MESSAGE_SIZE,
        });
    }
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    Ok(len as usize)
}

/// Parses a payload read after its header.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// Decodes one complete frame (header and payload) from a buffer.
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let header: [u8; HEADER_LEN] = data
        .get(..HEADER_LEN)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(ProtocolError::IncompleteMessage {
            expected: HEADER_LEN,
            received: data.len(),
        })?;
    let len = frame_len(header)?;

    let payload = data
        .get(HEADER_LEN..HEADER_LEN + len)
        .ok_or(ProtocolError::IncompleteMessage {
            expected: HEADER_LEN + len,
            received: data.len(),
        })?;
    decode_payload(payload)
}
