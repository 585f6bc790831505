//! Per-connection request handling.
//!
//! One connection carries exactly one request frame and gets exactly one
//! response frame back. Protocol and task failures become an `error_response`;
//! only a socket that can no longer be written to ends without a reply.

use super::server::ShutdownHandle;
use crate::executor::{TaskError, WorkerPool};
use crate::protocol::{Message, ProtocolError, read_message, write_message};

use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// A success response was written.
    Completed,
    /// An error response was written.
    Failed,
    /// The peer asked the server to stop; the acknowledgement was written.
    Shutdown,
    /// The socket failed before a response could be written.
    Closed,
}

/// Reads one request from `stream`, answers it and closes the stream.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    pool: &WorkerPool,
    shutdown: &ShutdownHandle,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let conn_id = Uuid::new_v4();
    tracing::debug!("[{}] Connection from {}", conn_id, peer);

    let (reply, mut outcome) = match read_message(&mut stream).await {
        Ok(message) => {
            tracing::info!("[{}] Received {} from {}", conn_id, message.type_name(), peer);
            respond(message, pool).await
        }
        Err(ProtocolError::UnknownMessageType(kind)) => {
            tracing::warn!("[{}] Unknown task type from {}: {}", conn_id, peer, kind);
            (
                Message::failure(TaskError::UnknownTaskKind(kind).to_string()),
                ConnectionOutcome::Failed,
            )
        }
        Err(e) => {
            tracing::warn!("[{}] Protocol error from {}: {}", conn_id, peer, e);
            (
                Message::failure(format!("Protocol error: {}", e)),
                ConnectionOutcome::Failed,
            )
        }
    };

    if let Err(e) = write_message(&mut stream, &reply).await {
        tracing::error!("[{}] Could not send response to {}: {}", conn_id, peer, e);
        outcome = ConnectionOutcome::Closed;
    }

    if let Err(e) = stream.shutdown().await {
        tracing::debug!("[{}] Close failed: {}", conn_id, e);
    }

    // Only after the acknowledgement has been flushed
    if outcome == ConnectionOutcome::Shutdown {
        tracing::info!("[{}] Shutdown requested by {}", conn_id, peer);
        shutdown.trigger();
    }

    tracing::debug!("[{}] Connection closed ({:?})", conn_id, outcome);
    outcome
}

async fn respond(message: Message, pool: &WorkerPool) -> (Message, ConnectionOutcome) {
    let request = match message.into_task_request() {
        Ok(request) => request,
        Err(Message::Ping) => return (Message::success(pong(pool)), ConnectionOutcome::Completed),
        Err(Message::Shutdown) => {
            return (
                Message::success(json!({"message": "Shutting down"})),
                ConnectionOutcome::Shutdown,
            );
        }
        // A response envelope sent as a request
        Err(other) => {
            let error = TaskError::UnknownTaskKind(other.type_name().to_string());
            return (Message::failure(error.to_string()), ConnectionOutcome::Failed);
        }
    };

    match pool.execute(request.kind.as_str(), &request.url, request.data).await {
        Ok(result) => (Message::success(annotate(result)), ConnectionOutcome::Completed),
        Err(e) => (Message::failure(e.to_string()), ConnectionOutcome::Failed),
    }
}

fn pong(pool: &WorkerPool) -> Value {
    json!({
        "message": "PONG from processor",
        "process_id": std::process::id(),
        "worker_pool_size": pool.size(),
        "active_workers": pool.active(),
        "timestamp": unix_timestamp(),
    })
}

/// Tags object results with the serving process.
fn annotate(mut result: Value) -> Value {
    if let Value::Object(fields) = &mut result {
        fields.insert("handled_by_process".to_string(), json!(std::process::id()));
    }
    result
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
