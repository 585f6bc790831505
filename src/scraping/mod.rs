//! Scraping Service Module
//!
//! The front tier's HTTP surface. A `/scrape` request is served in two phases:
//! 1. **Local**: The page is fetched and summarised in this process.
//! 2. **Remote**: The `TaskOrchestrator` asks the processing server for a
//!    screenshot, performance metrics and image details, in parallel.
//!
//! ## Submodules
//! - **`fetcher`**: `PageFetcher`, the local HTTP download and URL validation.
//! - **`parser`**: `parse_page`, HTML to `PageSummary`.
//! - **`context`**: `ScrapeContext` with its response cache and per-domain rate limiter.
//! - **`handlers`**: Axum handlers and the `router`.
//! - **`types`**: Summaries, the report body and `FetchError`.

pub mod context;
pub mod fetcher;
pub mod handlers;
pub mod parser;
pub mod types;

pub use context::{RateLimiter, ResponseCache, ScrapeContext};
pub use fetcher::PageFetcher;
pub use handlers::router;
pub use parser::parse_page;
pub use types::{FetchError, PageSummary, ScrapeReport};
