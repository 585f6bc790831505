use thiserror::Error;

/// Errors raised while framing, reading or interpreting a protocol message.
///
/// Every variant is fatal to the connection it occurred on and to nothing else.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload (outgoing) or declared length (incoming) is above the frame limit.
    #[error("message too large: {size} bytes (max {max} bytes)")]
    MessageTooLarge { size: usize, max: usize },

    /// The buffer holds fewer bytes than the frame it starts declares.
    #[error("incomplete message: expected {expected} bytes, received {received}")]
    IncompleteMessage { expected: usize, received: usize },

    /// The payload is not valid UTF-8 JSON, or does not fit the envelope shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The peer hung up in the middle of a frame.
    #[error("connection closed by peer after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    /// The envelope carries a `type` outside the known enumeration.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The envelope has no string `type` field.
    #[error("message has no `type` field")]
    MissingType,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
