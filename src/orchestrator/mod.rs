//! Task Orchestrator Module
//!
//! The front tier's side of the processing protocol. For every scraped URL it
//! requests three analyses from the processing server in parallel and folds the
//! outcomes into one `ConsolidatedResult`, whatever happened to each of them.
//!
//! ## Submodules
//! - **`client`**: `ProcessingClient`, one connection per request with layered timeouts.
//! - **`orchestrator`**: `TaskOrchestrator::process`, the fan-out / fan-in.
//! - **`types`**: `ClientError` and `ConsolidatedResult`.

pub mod client;
pub mod orchestrator;
pub mod types;

pub use client::ProcessingClient;
pub use orchestrator::TaskOrchestrator;
pub use types::{ClientError, ConsolidatedResult, SubTaskOutcome};

#[cfg(test)]
mod tests;
