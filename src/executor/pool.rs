//! Worker Pool Implementation
//!
//! Runs exactly one registered handler per request with a hard wall-clock limit
//! and a bounded number of simultaneous executions.
//!
//! ## Responsibilities
//! - **Slots**: A semaphore holds one permit per worker slot. Callers beyond the
//!   pool size queue on the semaphore instead of failing.
//! - **Isolation**: Each handler runs in its own spawned task, so a panic is
//!   contained to that task and surfaces here as a `JoinError`.
//! - **Timeouts**: When the limit elapses the slot is released immediately and
//!   the handler task is aborted. The same happens when the caller itself is
//!   cancelled. Abort is best-effort: a handler stuck in blocking code keeps
//!   running, but the pool no longer waits for it.
//! - **Shutdown**: New work is refused, in-flight work drains, then the
//!   semaphore is closed.

use super::registry::TaskHandlerRegistry;
use super::types::*;
use crate::protocol::TaskData;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Largest accepted pool size.
pub const MAX_POOL_SIZE: usize = 4096;

/// The bounded executor for task handlers.
pub struct WorkerPool {
    /// Registry containing the handler closures.
    registry: Arc<TaskHandlerRegistry>,
    /// One permit per worker slot.
    slots: Arc<Semaphore>,
    /// Number of worker slots.
    size: usize,
    /// Per-kind execution limits.
    policy: TimeoutPolicy,
    /// Set once shutdown starts; new work is refused from then on.
    closing: AtomicBool,
}

impl WorkerPool {
    /// Creates a pool with the default timeout policy.
    ///
    /// # Arguments
    /// * `size`: Typically the number of CPU cores. Clamped to `1..=MAX_POOL_SIZE`.
    pub fn new(registry: Arc<TaskHandlerRegistry>, size: usize) -> Arc<Self> {
        Self::with_policy(registry, size, TimeoutPolicy::default())
    }

    pub fn with_policy(
        registry: Arc<TaskHandlerRegistry>,
        size: usize,
        policy: TimeoutPolicy,
    ) -> Arc<Self> {
        let size = size.clamp(1, MAX_POOL_SIZE);
        tracing::info!(
            "Worker pool initialised with {} slots for {} task kinds",
            size,
            registry.handler_count()
        );

        Arc::new(Self {
            registry,
            slots: Arc::new(Semaphore::new(size)),
            size,
            policy,
            closing: AtomicBool::new(false),
        })
    }

    /// Number of worker slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of slots currently held by running tasks.
    pub fn active(&self) -> usize {
        self.size.saturating_sub(self.slots.available_permits())
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Runs the handler registered for `kind` inside a worker slot.
    ///
    /// Unknown kinds fail with `UnknownTaskKind` before a slot is taken.
    pub async fn execute(&self, kind: &str, url: &str, data: TaskData) -> TaskOutcome {
        let handler = self
            .registry
            .get(kind)
            .ok_or_else(|| TaskError::UnknownTaskKind(kind.to_string()))?;

        if self.closing.load(Ordering::SeqCst) {
            return Err(TaskError::PoolClosed);
        }

        let timeout = self.policy.resolve(kind, &data);

        // Queue here when every slot is busy
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TaskError::PoolClosed)?;

        tracing::info!("Processing {} task for {} (limit {:?})", kind, url, timeout);
        let started = Instant::now();

        // The set aborts the handler when dropped, so a cancelled caller
        // cannot leave it running without a slot
        let mut worker = JoinSet::new();
        worker.spawn(handler(url.to_string(), data));

        let joined = tokio::time::timeout(timeout, worker.join_next()).await;
        let outcome = match joined {
            Ok(None) => Err(TaskError::HandlerError("worker vanished".to_string())),
            Ok(Some(Ok(Ok(result)))) => {
                tracing::info!("Task completed: {} in {:?}", kind, started.elapsed());
                Ok(result)
            }
            Ok(Some(Ok(Err(e)))) => {
                tracing::error!("Error processing {}: {:#}", kind, e);
                Err(TaskError::HandlerError(format!("{:#}", e)))
            }
            Ok(Some(Err(join_error))) => {
                let reason = panic_reason(join_error);
                tracing::error!("Worker for {} task died: {}", kind, reason);
                Err(TaskError::HandlerError(format!("worker panicked: {}", reason)))
            }
            Err(_) => {
                worker.abort_all();
                tracing::error!("Timeout processing {} for {} (>{:?})", kind, url, timeout);
                Err(TaskError::HandlerTimeout {
                    kind: kind.to_string(),
                    after: timeout,
                })
            }
        };

        // Slot goes back to the pool whatever happened to the handler
        drop(permit);
        outcome
    }

    /// Refuses new work, waits for every in-flight task to finish, then closes.
    ///
    /// Callers already queued for a slot are served before the pool closes.
    pub async fn shutdown(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("Shutting down worker pool ({} active)", self.active());

        // size is clamped to MAX_POOL_SIZE, well inside u32
        match self.slots.acquire_many(self.size as u32).await {
            Ok(_drained) => tracing::info!("Worker pool drained"),
            Err(_) => tracing::debug!("Worker pool already closed"),
        }

        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

fn panic_reason(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }

    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
