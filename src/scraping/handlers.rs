use super::context::ScrapeContext;
use super::parser::parse_page;
use super::types::{FetchError, ScrapeReport, ScrapingData};

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Deserialize)]
pub struct ScrapeParams {
    pub url: Option<String>,
}

/// Routes of the scraping service, with `context` attached to every request.
pub fn router(context: Arc<ScrapeContext>) -> Router {
    Router::new()
        .route("/scrape", get(handle_scrape))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/stats", get(handle_stats))
        .layer(Extension(context))
}

/// `GET /scrape?url=`: local fetch + parse, then the three remote sub-tasks.
///
/// Sub-task failures are reported inside a 200 body; only the local fetch or
/// bad input changes the status.
pub async fn handle_scrape(
    Extension(context): Extension<Arc<ScrapeContext>>,
    Query(params): Query<ScrapeParams>,
) -> (StatusCode, Json<Value>) {
    let Some(url) = params.url.filter(|u| !u.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "URL parameter required",
                "usage": "GET /scrape?url=https://example.com",
            })),
        );
    };

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "URL must start with http:// or https://",
            })),
        );
    }

    if let Some(cached) = context.cache.get(&url) {
        tracing::info!("Cache hit: {}", url);
        return (StatusCode::OK, Json(cached));
    }

    if let Err(wait) = context.limiter.try_acquire(&url) {
        tracing::warn!("Rate limit exceeded for {}, retry in {:?}", url, wait);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "status": "error",
                "message": "Rate limit exceeded for this domain",
                "retry_after_seconds": wait.as_secs_f64().ceil(),
                "url": url,
            })),
        );
    }

    tracing::info!("Scraping request received: {}", url);
    let started = Instant::now();
    let timestamp_ms = unix_millis();

    let page = match context.fetcher.fetch(&url).await {
        Ok(page) => page,
        Err(e) => return fetch_failure(&url, e),
    };

    let summary = parse_page(&page.html, &page.url);
    tracing::info!("Parsed HTML: {:?}", summary.title);

    let processing_data = context.orchestrator.process(&url, &summary).await;
    let complete = processing_data.is_complete();

    let report = ScrapeReport {
        url: url.clone(),
        timestamp_ms,
        processing_time_seconds: (started.elapsed().as_secs_f64() * 100.0).round() / 100.0,
        scraping_data: ScrapingData::from(&summary),
        processing_data,
        status: "success",
        http_status: page.status,
    };

    let body = match serde_json::to_value(&report) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Could not serialize report for {}: {}", url, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.to_string(), "url": url})),
            );
        }
    };

    // Partial results are served but never cached
    if complete {
        context.cache.insert(&url, body.clone());
    }

    tracing::info!("Complete response ready for {}", url);
    (StatusCode::OK, Json(body))
}

fn fetch_failure(url: &str, error: FetchError) -> (StatusCode, Json<Value>) {
    let status = match &error {
        FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FetchError::Connect(_) => StatusCode::BAD_GATEWAY,
        FetchError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        FetchError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("Scrape of {} failed ({}): {}", url, status, error);

    (
        status,
        Json(json!({
            "status": "error",
            "message": error.to_string(),
            "url": url,
        })),
    )
}

/// `GET /health`: 200 when the processing server answers a ping, else 503.
pub async fn handle_health(
    Extension(context): Extension<Arc<ScrapeContext>>,
) -> (StatusCode, Json<Value>) {
    let client = context.client();
    let available = client.ping().await;

    let (status, label) = if available {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "timestamp_ms": unix_millis(),
            "server": "scraping",
            "processing_server": {
                "host": client.host(),
                "port": client.port(),
                "available": available,
            },
        })),
    )
}

pub async fn handle_info(Extension(context): Extension<Arc<ScrapeContext>>) -> Json<Value> {
    let client = context.client();

    Json(json!({
        "server": "Distributed Scraping Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/scrape": {
                "method": "GET",
                "parameters": {"url": "URL to scrape (required)"},
                "description": "Scrapes a webpage and returns structured data",
            },
            "/health": {"method": "GET", "description": "Health check endpoint"},
            "/info": {"method": "GET", "description": "Server information"},
            "/stats": {"method": "GET", "description": "Cache and rate limiter statistics"},
        },
        "features": [
            "Asynchronous web scraping",
            "HTML parsing and structure analysis",
            "Meta tags extraction",
            "Screenshot generation (via processing server)",
            "Performance analysis (via processing server)",
            "Image processing (via processing server)",
        ],
        "processing_server": {
            "host": client.host(),
            "port": client.port(),
        },
    }))
}

pub async fn handle_stats(Extension(context): Extension<Arc<ScrapeContext>>) -> Json<Value> {
    Json(json!({
        "cache": context.cache.stats(),
        "rate_limiter": context.limiter.stats(),
    }))
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
