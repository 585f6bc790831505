//! Processing Client
//!
//! Talks to the processing server with one fresh TCP connection per request:
//! connect, write one frame, read one frame, close. Connections are never
//! reused, so a broken exchange can only affect the sub-task that owns it.
//!
//! ## Timeout Layers
//! - **connect**: Establishing the TCP connection (default 5s).
//! - **request**: The whole round trip, connect included (default 30s).
//! - **ping**: The round trip of a liveness probe (default 5s).
//!
//! The processing server enforces its own per-kind execution limit on top of
//! these. When the request limit fires here the server is not told; the task
//! keeps its worker slot until the server-side limit or completion.

use super::types::ClientError;
use crate::config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_PING_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, ScrapingConfig,
};
use crate::protocol::{Message, TaskRequest, read_message, write_message};

use serde_json::Value;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub struct ProcessingClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    request_timeout: Duration,
    ping_timeout: Duration,
}

impl ProcessingClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }

    pub fn from_config(config: &ScrapingConfig) -> Self {
        Self::new(config.processing_host.clone(), config.processing_port)
            .with_timeouts(config.connect_timeout, config.request_timeout)
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn with_ping_timeout(mut self, ping: Duration) -> Self {
        self.ping_timeout = ping;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Sends one task and returns the server's result payload.
    pub async fn send_task(&self, request: TaskRequest) -> Result<Value, ClientError> {
        let kind = request.kind;
        tracing::debug!("Sending {} request for {} to {}", kind, request.url, self.addr());

        match self.round_trip(&Message::from(request), self.request_timeout).await? {
            Message::SuccessResponse { result, .. } => Ok(result),
            Message::ErrorResponse { error, .. } => {
                tracing::warn!("Processing server failed {} task: {}", kind, error);
                Err(ClientError::Remote(error))
            }
            other => Err(ClientError::UnexpectedResponse(other.type_name().to_string())),
        }
    }

    /// `true` when the server answers a ping within the ping timeout.
    pub async fn ping(&self) -> bool {
        match self.round_trip(&Message::Ping, self.ping_timeout).await {
            Ok(reply) => reply.is_success(),
            Err(e) => {
                tracing::debug!("Ping to {} failed: {}", self.addr(), e);
                false
            }
        }
    }

    /// Asks the server to stop accepting connections.
    pub async fn request_shutdown(&self) -> Result<Value, ClientError> {
        match self.round_trip(&Message::Shutdown, self.request_timeout).await? {
            Message::SuccessResponse { result, .. } => Ok(result),
            Message::ErrorResponse { error, .. } => Err(ClientError::Remote(error)),
            other => Err(ClientError::UnexpectedResponse(other.type_name().to_string())),
        }
    }

    /// One connection, one request frame, one response frame, all within `limit`.
    pub async fn round_trip(&self, request: &Message, limit: Duration) -> Result<Message, ClientError> {
        let exchange = async {
            let mut stream = self.connect().await?;
            write_message(&mut stream, request).await?;
            let reply = read_message(&mut stream).await?;
            Ok::<Message, ClientError>(reply)
        };

        match tokio::time::timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("No response from {} within {:?}", self.addr(), limit);
                Err(ClientError::ResponseTimeout { after: limit })
            }
        }
    }

    async fn connect(&self) -> Result<TcpStream, ClientError> {
        let connecting = TcpStream::connect((self.host.as_str(), self.port));

        match tokio::time::timeout(self.connect_timeout, connecting).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(ClientError::ConnectionRefused { addr: self.addr() })
            }
            Ok(Err(e)) => Err(ClientError::Io(e)),
            Err(_) => Err(ClientError::ConnectionTimeout {
                addr: self.addr(),
                after: self.connect_timeout,
            }),
        }
    }
}
