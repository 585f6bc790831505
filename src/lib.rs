//! Distributed Scraper Library
//!
//! This library crate defines the modules behind the two services started by
//! the binary (`main.rs`).
//!
//! ## Architecture Modules
//! The system is split into a front tier that talks HTTP to end clients and a
//! back tier that executes analysis tasks behind a framed TCP protocol:
//!
//! - **`protocol`**: The wire format shared by both tiers. Length-prefixed JSON
//!   frames with a 10 MiB cap and a tagged `Message` envelope.
//! - **`executor`**: The back tier's bounded worker pool. Runs registered task
//!   handlers with per-kind timeouts and contains their failures.
//! - **`processor`**: The task handler bodies (performance, images, screenshot).
//! - **`dispatcher`**: The back tier's TCP server. One request and one response
//!   per connection, each connection supervised on its own task.
//! - **`orchestrator`**: The front tier's client for the back tier. Fans a URL
//!   out into three sub-tasks and consolidates whatever comes back.
//! - **`scraping`**: The front tier's HTTP service: local fetch and parse,
//!   response cache, per-domain rate limiting.
//! - **`config`**: Settings and defaults for both services.

pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod orchestrator;
pub mod processor;
pub mod protocol;
pub mod scraping;

#[cfg(test)]
mod test_support;
