use crate::protocol::TaskData;

use anyhow::Result;
use serde_json::{Value, json};
use std::time::Duration;

/// Hard cap on images fetched per request.
pub const MAX_IMAGES: usize = 5;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "Mozilla/5.0";

/// Reads `image_urls` / `max_images` out of the request options.
pub fn image_targets(options: &TaskData) -> Vec<String> {
    let limit = options
        .get("max_images")
        .and_then(Value::as_u64)
        .map_or(MAX_IMAGES, |n| (n as usize).min(MAX_IMAGES));

    options
        .get("image_urls")
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(Value::as_str)
                .take(limit)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Task handler: downloads each listed image and reports what came back.
///
/// Images that fail to download are skipped, so a page with broken images still
/// yields a (shorter) successful list.
pub async fn process_images(_url: String, options: TaskData) -> Result<Value> {
    let targets = image_targets(&options);
    tracing::info!("Processing {} image(s)", targets.len());

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?;

    let mut results = Vec::with_capacity(targets.len());

    for (i, image_url) in targets.iter().enumerate() {
        tracing::debug!("Downloading image {}/{}: {}", i + 1, targets.len(), image_url);

        let response = match client.get(image_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Error downloading {}: {}", image_url, e);
                continue;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!("Error downloading {}: HTTP {}", image_url, response.status());
            continue;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Error reading {}: {}", image_url, e);
                continue;
            }
        };

        results.push(json!({
            "url": image_url,
            "format": image_format(&content_type),
            "content_type": content_type,
            "size_bytes": bytes.len(),
        }));
    }

    tracing::info!("Processed {} of {} images", results.len(), targets.len());
    Ok(Value::Array(results))
}

/// `image/png; charset=binary` -> `PNG`.
fn image_format(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .and_then(|mime| mime.trim().strip_prefix("image/"))
        .filter(|subtype| !subtype.is_empty())
        .map_or_else(|| "UNKNOWN".to_string(), str::to_uppercase)
}
