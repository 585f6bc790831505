//! Task Processor Module
//!
//! The concrete task bodies the back tier runs inside its worker pool. Each is a
//! plain `async fn(url, options) -> anyhow::Result<Value>`; the pool supplies
//! the slot, the timeout and the error wrapping.
//!
//! - **`performance`**: timed fetch with size and resource counts.
//! - **`images`**: downloads up to five image URLs and reports their size and format.
//! - **`screenshot`**: viewport descriptor (placeholder capture).

pub mod images;
pub mod performance;
pub mod screenshot;

use crate::executor::TaskHandlerRegistry;
use crate::protocol::TaskKind;

use std::sync::Arc;

/// A registry with one handler per `TaskKind`.
pub fn default_registry() -> Arc<TaskHandlerRegistry> {
    let registry = TaskHandlerRegistry::new();

    registry.register(TaskKind::Screenshot.as_str(), screenshot::generate_screenshot);
    registry.register(TaskKind::Performance.as_str(), performance::analyze_performance);
    registry.register(TaskKind::Images.as_str(), images::process_images);

    registry
}
