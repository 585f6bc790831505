use crate::protocol::{TaskData, TaskKind};

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Timeout applied to registered kinds with no explicit entry in the policy.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound for a per-request `data.timeout` override.
pub const MAX_TIMEOUT_OVERRIDE: Duration = Duration::from_secs(60);

/// Outcome of one task execution inside the worker pool.
pub type TaskOutcome = Result<Value, TaskError>;

/// Failures produced at the worker pool boundary.
///
/// Handler failures of any shape are flattened into `HandlerError` so that
/// nothing but a message string ever crosses the wire.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError {
    #[error("Unknown task type: {0}")]
    UnknownTaskKind(String),

    #[error("Timeout after {} seconds ({kind})", .after.as_secs_f64())]
    HandlerTimeout { kind: String, after: Duration },

    #[error("{0}")]
    HandlerError(String),

    #[error("worker pool is shut down")]
    PoolClosed,
}

/// Wall-clock limits per task kind.
///
/// Defaults: screenshot 15s, performance 10s, images 20s. A request may carry a
/// positive `timeout` (seconds) in its options, which wins over the kind default
/// up to [`MAX_TIMEOUT_OVERRIDE`].
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    per_kind: HashMap<String, Duration>,
    fallback: Duration,
    max_override: Duration,
}

impl TimeoutPolicy {
    /// Sets the limit for `kind`.
    pub fn with_timeout(mut self, kind: &str, timeout: Duration) -> Self {
        self.per_kind.insert(kind.to_string(), timeout);
        self
    }

    pub fn with_fallback(mut self, timeout: Duration) -> Self {
        self.fallback = timeout;
        self
    }

    /// The kind's configured limit, ignoring request overrides.
    pub fn for_kind(&self, kind: &str) -> Duration {
        self.per_kind.get(kind).copied().unwrap_or(self.fallback)
    }

    /// The limit that applies to one request.
    pub fn resolve(&self, kind: &str, data: &TaskData) -> Duration {
        data.get("timeout")
            .and_then(Value::as_f64)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            // Clamp before converting: from_secs_f64 panics past Duration::MAX
            .map(|secs| Duration::from_secs_f64(secs.min(self.max_override.as_secs_f64())))
            .unwrap_or_else(|| self.for_kind(kind))
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        let per_kind = HashMap::from([
            (TaskKind::Screenshot.as_str().to_string(), Duration::from_secs(15)),
            (TaskKind::Performance.as_str().to_string(), Duration::from_secs(10)),
            (TaskKind::Images.as_str().to_string(), Duration::from_secs(20)),
        ]);

        Self {
            per_kind,
            fallback: FALLBACK_TIMEOUT,
            max_override: MAX_TIMEOUT_OVERRIDE,
        }
    }
}
