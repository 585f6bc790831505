use super::client::ProcessingClient;
use super::types::{ConsolidatedResult, SubTaskOutcome};
use crate::processor::images::MAX_IMAGES;
use crate::processor::screenshot::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::protocol::{TaskData, TaskKind, TaskRequest};
use crate::scraping::PageSummary;

use serde_json::{Value, json};
use std::time::Instant;

/// Execution limits requested from the processing server, in seconds.
const SCREENSHOT_TIMEOUT_SECS: u64 = 15;
const PERFORMANCE_TIMEOUT_SECS: u64 = 10;

/// Fans one URL out into the three sub-tasks and gathers their outcomes.
#[derive(Debug, Clone)]
pub struct TaskOrchestrator {
    client: ProcessingClient,
}

impl TaskOrchestrator {
    pub fn new(client: ProcessingClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ProcessingClient {
        &self.client
    }

    /// Runs screenshot, performance and images concurrently.
    ///
    /// Never fails and never returns before all three have finished: a failed
    /// or timed-out sub-task only turns its own entry into an error.
    pub async fn process(&self, url: &str, summary: &PageSummary) -> ConsolidatedResult {
        let started = Instant::now();
        tracing::info!("Requesting processing for {}", url);

        let image_urls: Vec<String> = summary.image_urls.iter().take(MAX_IMAGES).cloned().collect();

        let (screenshot, performance, images) = tokio::join!(
            self.run(TaskKind::Screenshot, url, screenshot_options()),
            self.run(TaskKind::Performance, url, performance_options()),
            self.run_images(url, image_urls),
        );

        let result = ConsolidatedResult::new(screenshot, performance, images);

        let failures = result.failures();
        if failures.is_empty() {
            tracing::info!("Processing for {} completed in {:?}", url, started.elapsed());
        } else {
            tracing::warn!(
                "Processing for {} completed in {:?} with {} failed sub-task(s): {:?}",
                url,
                started.elapsed(),
                failures.len(),
                failures
            );
        }

        result
    }

    async fn run(&self, kind: TaskKind, url: &str, data: TaskData) -> SubTaskOutcome {
        let started = Instant::now();
        match self.client.send_task(TaskRequest::new(kind, url, data)).await {
            Ok(result) => {
                tracing::debug!("{} sub-task finished in {:?}", kind, started.elapsed());
                Ok(result)
            }
            Err(e) => {
                tracing::warn!("{} sub-task for {} failed: {}", kind, url, e);
                Err(e.to_string())
            }
        }
    }

    async fn run_images(&self, url: &str, image_urls: Vec<String>) -> SubTaskOutcome {
        if image_urls.is_empty() {
            tracing::debug!("No images on {}, skipping images sub-task", url);
            return Ok(Value::Array(Vec::new()));
        }

        self.run(TaskKind::Images, url, images_options(image_urls)).await
    }
}

fn screenshot_options() -> TaskData {
    options(json!({
        "timeout": SCREENSHOT_TIMEOUT_SECS,
        "width": DEFAULT_WIDTH,
        "height": DEFAULT_HEIGHT,
    }))
}

fn performance_options() -> TaskData {
    options(json!({ "timeout": PERFORMANCE_TIMEOUT_SECS }))
}

fn images_options(image_urls: Vec<String>) -> TaskData {
    options(json!({
        "image_urls": image_urls,
        "max_images": MAX_IMAGES,
    }))
}

fn options(value: Value) -> TaskData {
    match value {
        Value::Object(map) => map,
        _ => TaskData::new(),
    }
}
