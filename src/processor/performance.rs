//! Page performance probe.
//!
//! A single timed GET with a short client timeout. A page that cannot be
//! fetched still produces a result (zeroed metrics plus an `analysis_mode`
//! describing why) rather than failing the task.

use crate::protocol::TaskData;

use anyhow::Result;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REDIRECTS: usize = 10;
/// Bodies larger than this are not scanned for resource tags.
const MAX_SCANNED_BODY: usize = 500_000;
const USER_AGENT: &str = "Mozilla/5.0";

pub(crate) struct ResourcePatterns {
    scripts: Regex,
    stylesheets: Regex,
    images: Regex,
    videos: Regex,
    iframes: Regex,
}

/// Compiled once; a pattern that fails to compile is reported on every use.
pub(crate) fn resource_patterns() -> Result<&'static ResourcePatterns, &'static regex::Error> {
    static PATTERNS: OnceLock<Result<ResourcePatterns, regex::Error>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Ok(ResourcePatterns {
                scripts: Regex::new(r"(?i)<script\b")?,
                stylesheets: Regex::new(r#"(?i)<link\b[^>]*\brel\s*=\s*["']?stylesheet"#)?,
                images: Regex::new(r"(?i)<img\b")?,
                videos: Regex::new(r"(?i)<video\b")?,
                iframes: Regex::new(r"(?i)<iframe\b")?,
            })
        })
        .as_ref()
}

/// Counts the sub-resources referenced by an HTML document.
pub fn count_resources(html: &str) -> Value {
    let p = match resource_patterns() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Resource patterns failed to compile, counts are zeroed: {}", e);
            return count_resources_with(|_| 0);
        }
    };
    count_resources_with(|kind| {
        let re = match kind {
            "scripts" => &p.scripts,
            "stylesheets" => &p.stylesheets,
            "images" => &p.images,
            "videos" => &p.videos,
            _ => &p.iframes,
        };
        re.find_iter(html).count()
    })
}

fn count_resources_with(count: impl Fn(&str) -> usize) -> Value {
    json!({
        "scripts": count("scripts"),
        "stylesheets": count("stylesheets"),
        "images": count("images"),
        "videos": count("videos"),
        "iframes": count("iframes"),
    })
}

/// Task handler: measures load time, size and resource counts for `url`.
pub async fn analyze_performance(url: String, _options: TaskData) -> Result<Value> {
    tracing::info!("Performance analysis (fast mode): {}", url);

    let redirects = Arc::new(AtomicUsize::new(0));
    let seen = redirects.clone();
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        let hops = attempt.previous().len();
        seen.store(hops, Ordering::SeqCst);
        if hops > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    });

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .redirect(policy)
        .user_agent(USER_AGENT)
        .build()?;

    let started = Instant::now();

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            tracing::warn!("Timeout ({:?}) probing {}, using estimated values", REQUEST_TIMEOUT, url);
            return Ok(fallback_metrics(
                REQUEST_TIMEOUT.as_millis() as f64,
                "timeout_fallback",
                format!("Request timeout after {}s", REQUEST_TIMEOUT.as_secs()),
            ));
        }
        Err(e) => {
            tracing::error!("Performance probe failed for {}: {}", url, e);
            return Ok(fallback_metrics(0.0, "error_fallback", e.to_string()));
        }
    };

    let status_code = response.status().as_u16();
    let (content_type, server) = {
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string()
        };
        (header(reqwest::header::CONTENT_TYPE), header(reqwest::header::SERVER))
    };

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Failed reading body of {}: {}", url, e);
            return Ok(fallback_metrics(0.0, "error_fallback", e.to_string()));
        }
    };

    let load_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    let page_size_kb = round2(body.len() as f64 / 1024.0);

    let resources = if content_type.to_lowercase().contains("html") && body.len() < MAX_SCANNED_BODY {
        count_resources(&String::from_utf8_lossy(&body))
    } else {
        count_resources("")
    };

    let sub_requests: u64 = resources
        .as_object()
        .map(|counts| counts.values().filter_map(Value::as_u64).sum())
        .unwrap_or(0);

    tracing::info!("Performance OK: {:.2}ms, {} bytes", load_time_ms, body.len());

    Ok(json!({
        "load_time_ms": round2(load_time_ms),
        "total_size_kb": page_size_kb,
        "page_size_kb": page_size_kb,
        "num_requests": 1 + sub_requests,
        "status_code": status_code,
        "redirect_count": redirects.load(Ordering::SeqCst),
        "resources": resources,
        "content_type": content_type,
        "server": server,
        "analysis_mode": "fast",
    }))
}

fn fallback_metrics(load_time_ms: f64, mode: &str, note: String) -> Value {
    json!({
        "load_time_ms": load_time_ms,
        "total_size_kb": 0,
        "page_size_kb": 0,
        "num_requests": if mode == "timeout_fallback" { 1 } else { 0 },
        "status_code": 0,
        "redirect_count": 0,
        "resources": count_resources(""),
        "content_type": "unknown",
        "server": "unknown",
        "analysis_mode": mode,
        "note": note,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
