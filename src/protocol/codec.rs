//! In-memory frame codec.
//!
//! `encode` and `decode` work on complete byte buffers. The streaming readers in
//! [`super::stream`] reuse [`check_length`] and [`parse_payload`] so that both
//! paths enforce the same limits.

use super::error::ProtocolError;
use super::types::Message;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Size of the big-endian length prefix.
pub const HEADER_SIZE: usize = 4;

/// Largest payload a frame may carry (10 MiB).
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Serializes `message` to JSON and prepends its 4-byte big-endian length.
///
/// Non-ASCII text is written as raw UTF-8, never `\u` escaped.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload =
        serde_json::to_vec(message).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

    check_length(payload.len())?;

    // check_length keeps us under 10 MiB, so the cast cannot truncate.
    let header = (payload.len() as u32).to_be_bytes();

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes the frame at the start of `buffer`.
///
/// The declared length is validated against [`MAX_MESSAGE_SIZE`] before the
/// buffer is inspected any further. Trailing bytes past the frame are ignored.
pub fn decode<T: DeserializeOwned>(buffer: &[u8]) -> Result<T, ProtocolError> {
    let Some(header) = buffer.get(..HEADER_SIZE) else {
        return Err(ProtocolError::IncompleteMessage {
            expected: HEADER_SIZE,
            received: buffer.len(),
        });
    };

    let length = declared_length(header)?;
    let expected = HEADER_SIZE + length;

    match buffer.get(HEADER_SIZE..expected) {
        Some(payload) => parse_payload(payload),
        None => Err(ProtocolError::IncompleteMessage {
            expected,
            received: buffer.len(),
        }),
    }
}

/// Decodes a frame and validates it as a tagged [`Message`].
pub fn decode_message(buffer: &[u8]) -> Result<Message, ProtocolError> {
    let value: serde_json::Value = decode(buffer)?;
    Message::from_value(value)
}

/// Reads the length prefix out of a 4-byte header and checks it against the limit.
pub(crate) fn declared_length(header: &[u8]) -> Result<usize, ProtocolError> {
    let bytes: [u8; HEADER_SIZE] =
        header
            .try_into()
            .map_err(|_| ProtocolError::IncompleteMessage {
                expected: HEADER_SIZE,
                received: header.len(),
            })?;

    let length = u32::from_be_bytes(bytes) as usize;
    check_length(length)?;
    Ok(length)
}

pub(crate) fn check_length(length: usize) -> Result<(), ProtocolError> {
    if length > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: length,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

pub(crate) fn parse_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    let text =
        std::str::from_utf8(payload).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
    serde_json::from_str(text).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}
