use crate::protocol::{ProtocolError, TaskKind};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Why one sub-task round trip to the processing server failed.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Processing server unavailable (connection refused)")]
    ConnectionRefused { addr: String },

    #[error("Connection timeout to processing server")]
    ConnectionTimeout { addr: String, after: Duration },

    #[error("Response timeout after {}s", .after.as_secs_f64())]
    ResponseTimeout { after: Duration },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server answered with an `error_response`.
    #[error("{0}")]
    Remote(String),

    #[error("Unexpected response type: {0}")]
    UnexpectedResponse(String),

    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one sub-task as seen by the orchestrator.
pub type SubTaskOutcome = Result<Value, String>;

/// The three sub-task outcomes for one URL.
///
/// Every kind is always present. Serialized, a failed kind shows its payload
/// key as `null` (`[]` for thumbnails) next to a `<kind>_error` string; a
/// successful kind has no error key.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedResult {
    pub screenshot: SubTaskOutcome,
    pub performance: SubTaskOutcome,
    pub images: SubTaskOutcome,
}

impl ConsolidatedResult {
    /// Builds the result, checking the shape of the performance payload.
    pub fn new(screenshot: SubTaskOutcome, performance: SubTaskOutcome, images: SubTaskOutcome) -> Self {
        let performance = performance.and_then(|metrics| {
            if metrics.get("load_time_ms").is_some() {
                Ok(metrics)
            } else {
                Err("Invalid performance data structure".to_string())
            }
        });

        Self {
            screenshot,
            performance,
            images,
        }
    }

    pub fn outcome(&self, kind: TaskKind) -> &SubTaskOutcome {
        match kind {
            TaskKind::Screenshot => &self.screenshot,
            TaskKind::Performance => &self.performance,
            TaskKind::Images => &self.images,
        }
    }

    /// Kinds whose sub-task failed, in `TaskKind::ALL` order.
    pub fn failures(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|kind| self.outcome(*kind).is_err())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }
}

impl Serialize for ConsolidatedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        match &self.screenshot {
            Ok(value) => map.serialize_entry("screenshot", value)?,
            Err(error) => {
                map.serialize_entry("screenshot", &Value::Null)?;
                map.serialize_entry("screenshot_error", error)?;
            }
        }

        match &self.performance {
            Ok(value) => map.serialize_entry("performance", value)?,
            Err(error) => {
                map.serialize_entry("performance", &Value::Null)?;
                map.serialize_entry("performance_error", error)?;
            }
        }

        match &self.images {
            Ok(value) => map.serialize_entry("thumbnails", value)?,
            Err(error) => {
                map.serialize_entry("thumbnails", &Value::Array(Vec::new()))?;
                map.serialize_entry("images_error", error)?;
            }
        }

        map.end()
    }
}
