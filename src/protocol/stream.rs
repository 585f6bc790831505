//! Frame I/O over connected streams.
//!
//! Readers pull exactly 4 header bytes and then exactly `length` payload bytes.
//! A peer that closes the stream before a frame is complete produces
//! [`ProtocolError::ConnectionClosed`]; there is no partial-read recovery.

use super::codec::{HEADER_SIZE, declared_length, encode, parse_payload};
use super::error::ProtocolError;
use super::types::Message;

use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one frame and returns its raw JSON value.
pub async fn read_value<R>(reader: &mut R) -> Result<Value, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    read_exact_async(reader, &mut header).await?;

    let length = declared_length(&header)?;
    let mut payload = vec![0u8; length];
    read_exact_async(reader, &mut payload).await?;

    parse_payload(&payload)
}

/// Reads one frame and validates it as a tagged [`Message`].
pub async fn read_message<R>(reader: &mut R) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let value = read_value(reader).await?;
    Message::from_value(value)
}

/// Encodes `message`, writes the whole frame and flushes the writer.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Blocking counterpart of [`read_message`].
pub fn read_message_blocking<R: Read>(reader: &mut R) -> Result<Message, ProtocolError> {
    let mut header = [0u8; HEADER_SIZE];
    read_exact_blocking(reader, &mut header)?;

    let length = declared_length(&header)?;
    let mut payload = vec![0u8; length];
    read_exact_blocking(reader, &mut payload)?;

    let value: Value = parse_payload(&payload)?;
    Message::from_value(value)
}

/// Blocking counterpart of [`write_message`].
pub fn write_message_blocking<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: Write,
    T: Serialize + ?Sized,
{
    let frame = encode(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

async fn read_exact_async<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let Some(rest) = buf.get_mut(filled..) else {
            break;
        };
        let n = reader.read(rest).await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed {
                expected: buf.len(),
                received: filled,
            });
        }
        filled += n;
    }
    Ok(())
}

fn read_exact_blocking<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        let Some(rest) = buf.get_mut(filled..) else {
            break;
        };
        match reader.read(rest) {
            Ok(0) => {
                return Err(ProtocolError::ConnectionClosed {
                    expected: buf.len(),
                    received: filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
