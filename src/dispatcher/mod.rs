//! Connection Dispatcher Module
//!
//! The back tier's TCP front door. It accepts connections, reads one framed
//! request from each, routes it and writes one framed response back.
//!
//! ## Routing
//! - **`ping`**: Answered directly with liveness metadata; the pool is not touched.
//! - **`shutdown`**: Acknowledged, then the accept loop stops and in-flight work drains.
//! - **Task requests**: Handed to the `WorkerPool`; its outcome becomes the response.
//!
//! ## Submodules
//! - **`server`**: `ProcessingServer` (bind, accept loop, shutdown) and `ShutdownHandle`.
//! - **`connection`**: `handle_connection`, the one-request-one-response exchange.

pub mod connection;
pub mod server;

pub use connection::{ConnectionOutcome, handle_connection};
pub use server::{ProcessingServer, ShutdownHandle};
