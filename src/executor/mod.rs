//! Task Executor Module
//!
//! The back tier's execution engine: every task request that reaches the
//! dispatcher is run here, inside a bounded pool of worker slots, with a hard
//! per-kind timeout.
//!
//! ## Execution Model
//! 1. **Lookup**: The task kind is resolved against the `TaskHandlerRegistry`.
//!    Unknown kinds are refused without touching the pool.
//! 2. **Admission**: The caller waits for a free worker slot. Excess requests
//!    queue; they never fail for lack of capacity.
//! 3. **Execution**: The handler runs in its own supervised task. Panics and
//!    errors are converted to `TaskError` at the pool boundary.
//! 4. **Reclamation**: The slot is released on completion, failure or timeout.
//!
//! ## Submodules
//! - **`registry`**: Maps kind names (e.g., "screenshot") to async handler closures.
//! - **`pool`**: The `WorkerPool` itself (slots, timeouts, shutdown).
//! - **`types`**: `TaskError` and the `TimeoutPolicy`.

pub mod pool;
pub mod registry;
pub mod types;

pub use pool::WorkerPool;
pub use registry::TaskHandlerRegistry;
pub use types::{TaskError, TaskOutcome, TimeoutPolicy};
