//! Wire Protocol Module
//!
//! Length-prefixed JSON framing shared by the scraping front tier and the
//! processing back tier.
//!
//! ## Frame Layout
//! ```text
//! [ 4 bytes: payload length, big-endian u32 ][ payload: UTF-8 JSON ]
//! ```
//! Payloads are capped at 10 MiB. A frame whose header declares more than that
//! is rejected before a single payload byte is read, so a hostile peer cannot
//! make the receiver allocate an arbitrary buffer.
//!
//! ## Submodules
//! - **`codec`**: Pure in-memory `encode` / `decode` over byte buffers.
//! - **`stream`**: Exact-read framing over async (`tokio`) and blocking (`std::io`) streams.
//! - **`types`**: The tagged `Message` envelope, `TaskKind` and `TaskRequest`.
//! - **`error`**: `ProtocolError`, the framing/parsing error taxonomy.

pub mod codec;
pub mod error;
pub mod stream;
pub mod types;

pub use codec::{HEADER_SIZE, MAX_MESSAGE_SIZE, decode, decode_message, encode};
pub use error::ProtocolError;
pub use stream::{read_message, read_message_blocking, read_value, write_message, write_message_blocking};
pub use types::{Message, TaskData, TaskKind, TaskRequest};

#[cfg(test)]
mod tests;
