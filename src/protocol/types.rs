use super::error::ProtocolError;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind-specific request options, carried as the envelope's `data` mapping.
pub type TaskData = serde_json::Map<String, Value>;

/// Every `type` value the protocol understands.
pub const MESSAGE_TYPES: [&str; 7] = [
    "ping",
    "shutdown",
    "screenshot_request",
    "performance_request",
    "images_request",
    "success_response",
    "error_response",
];

/// The three analyses the front tier requests per URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Screenshot,
    Performance,
    Images,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Screenshot, TaskKind::Performance, TaskKind::Images];

    /// Name used as the handler key in the worker pool registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Screenshot => "screenshot",
            TaskKind::Performance => "performance",
            TaskKind::Images => "images",
        }
    }

    /// The envelope `type` carried by requests of this kind.
    pub fn request_type(&self) -> &'static str {
        match self {
            TaskKind::Screenshot => "screenshot_request",
            TaskKind::Performance => "performance_request",
            TaskKind::Images => "images_request",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sub-task as it travels from the orchestrator to the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub kind: TaskKind,
    pub url: String,
    pub data: TaskData,
}

impl TaskRequest {
    pub fn new(kind: TaskKind, url: impl Into<String>, data: TaskData) -> Self {
        Self {
            kind,
            url: url.into(),
            data,
        }
    }
}

/// The protocol envelope, discriminated by its `type` field.
///
/// Requests always carry a `url`; responses always carry `success` plus exactly
/// one of `result` / `error`. Build responses through [`Message::success`] and
/// [`Message::failure`] so the flag and the variant cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Ping,
    Shutdown,
    ScreenshotRequest {
        url: String,
        #[serde(default)]
        data: TaskData,
    },
    PerformanceRequest {
        url: String,
        #[serde(default)]
        data: TaskData,
    },
    ImagesRequest {
        url: String,
        #[serde(default)]
        data: TaskData,
    },
    SuccessResponse {
        success: bool,
        result: Value,
    },
    ErrorResponse {
        success: bool,
        error: String,
    },
}

impl Message {
    /// Validates a decoded JSON value against the envelope schema.
    ///
    /// An unrecognised `type` is reported as [`ProtocolError::UnknownMessageType`]
    /// before any other field is looked at.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;

        if !MESSAGE_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownMessageType(kind.to_string()));
        }

        check_response_shape(kind, &value)?;

        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
    }

    pub fn success(result: Value) -> Self {
        Message::SuccessResponse {
            success: true,
            result,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Message::ErrorResponse {
            success: false,
            error: error.into(),
        }
    }

    pub fn task_request(kind: TaskKind, url: impl Into<String>, data: TaskData) -> Self {
        TaskRequest::new(kind, url, data).into()
    }

    /// Splits a request envelope into its task request; other kinds come back unchanged.
    pub fn into_task_request(self) -> Result<TaskRequest, Self> {
        match self {
            Message::ScreenshotRequest { url, data } => {
                Ok(TaskRequest::new(TaskKind::Screenshot, url, data))
            }
            Message::PerformanceRequest { url, data } => {
                Ok(TaskRequest::new(TaskKind::Performance, url, data))
            }
            Message::ImagesRequest { url, data } => Ok(TaskRequest::new(TaskKind::Images, url, data)),
            other => Err(other),
        }
    }

    /// The wire `type` of this envelope.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Ping => "ping",
            Message::Shutdown => "shutdown",
            Message::ScreenshotRequest { .. } => "screenshot_request",
            Message::PerformanceRequest { .. } => "performance_request",
            Message::ImagesRequest { .. } => "images_request",
            Message::SuccessResponse { .. } => "success_response",
            Message::ErrorResponse { .. } => "error_response",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Message::SuccessResponse { success: true, .. })
    }
}

impl From<TaskRequest> for Message {
    fn from(request: TaskRequest) -> Self {
        let TaskRequest { kind, url, data } = request;
        match kind {
            TaskKind::Screenshot => Message::ScreenshotRequest { url, data },
            TaskKind::Performance => Message::PerformanceRequest { url, data },
            TaskKind::Images => Message::ImagesRequest { url, data },
        }
    }
}

/// The `success` flag must agree with the variant, and a success must carry `result`.
fn check_response_shape(kind: &str, value: &Value) -> Result<(), ProtocolError> {
    let expected = match kind {
        "success_response" => true,
        "error_response" => false,
        _ => return Ok(()),
    };

    match value.get("success").and_then(Value::as_bool) {
        Some(flag) if flag == expected => {}
        Some(flag) => {
            return Err(ProtocolError::MalformedPayload(format!(
                "{} with success={}",
                kind, flag
            )));
        }
        None => {
            return Err(ProtocolError::MalformedPayload(format!(
                "{} without a boolean `success`",
                kind
            )));
        }
    }

    if expected && value.get("result").is_none() {
        return Err(ProtocolError::MalformedPayload(
            "success_response without `result`".to_string(),
        ));
    }

    Ok(())
}
