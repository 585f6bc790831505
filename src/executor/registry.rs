//! Task Handler Registry
//!
//! A dynamic registry that maps task kind names (e.g., "performance")
//! to executable Rust closures. This keeps the worker pool generic: it only
//! enforces slots, timeouts and error wrapping, and never knows what a
//! handler actually does.

use crate::protocol::TaskData;

use anyhow::Result;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a type-erased task handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Type alias for a thread-safe, asynchronous task handler function.
/// It takes the target URL and the request options and resolves to a JSON result.
pub type TaskHandlerFn = Arc<dyn Fn(String, TaskData) -> HandlerFuture + Send + Sync>;

/// Registry holding the mapping between task kinds and their implementation.
pub struct TaskHandlerRegistry {
    handlers: DashMap<String, TaskHandlerFn>,
}

impl TaskHandlerRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
        })
    }

    /// Registers a handler under a task kind name, replacing any previous one.
    ///
    /// # Arguments
    /// * `kind` - The task kind the handler serves (e.g., "screenshot").
    /// * `handler` - `(url, options) -> Future<Result<Value>>`.
    pub fn register<F, Fut>(&self, kind: &str, handler: F)
    where
        F: Fn(String, TaskData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        // Box::pin erases the concrete future type so different async fns fit one map.
        let handler_fn: TaskHandlerFn =
            Arc::new(move |url: String, data: TaskData| Box::pin(handler(url, data)) as HandlerFuture);

        self.handlers.insert(kind.to_string(), handler_fn);

        tracing::info!("Registered task handler: {}", kind);
    }

    /// Returns a cloned handle to the handler for `kind`, if any.
    pub fn get(&self, kind: &str) -> Option<TaskHandlerFn> {
        self.handlers.get(kind).map(|entry| entry.value().clone())
    }

    /// Returns the total number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for TaskHandlerRegistry {
    fn default() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }
}
