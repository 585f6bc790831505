use crate::orchestrator::ConsolidatedResult;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Everything the front tier extracts from a page locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    /// `<title>`, else the first `<h1>`, else empty.
    pub title: String,
    /// Absolute http(s) links, sorted and de-duplicated.
    pub links: Vec<String>,
    pub meta_tags: MetaTags,
    /// `h1` .. `h6` occurrence counts.
    pub structure: BTreeMap<String, usize>,
    pub images_count: usize,
    /// Absolute http(s) image sources in document order.
    pub image_urls: Vec<String>,
    pub text_stats: TextStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub open_graph: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub twitter: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub word_count: usize,
    pub char_count: usize,
    pub paragraph_count: usize,
    pub list_count: usize,
}

/// A fetched page before parsing.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub html: String,
}

/// The `/scrape` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub url: String,
    pub timestamp_ms: u64,
    pub processing_time_seconds: f64,
    pub scraping_data: ScrapingData,
    pub processing_data: ConsolidatedResult,
    pub status: &'static str,
    pub http_status: u16,
}

/// The part of [`PageSummary`] echoed back to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapingData {
    pub title: String,
    pub links: Vec<String>,
    pub links_count: usize,
    pub meta_tags: MetaTags,
    pub structure: BTreeMap<String, usize>,
    pub images_count: usize,
    pub text_stats: TextStats,
}

/// Links echoed in a report; `links_count` still reports the full number.
pub const REPORTED_LINKS: usize = 50;

impl From<&PageSummary> for ScrapingData {
    fn from(summary: &PageSummary) -> Self {
        Self {
            title: summary.title.clone(),
            links: summary.links.iter().take(REPORTED_LINKS).cloned().collect(),
            links_count: summary.links.len(),
            meta_tags: summary.meta_tags.clone(),
            structure: summary.structure.clone(),
            images_count: summary.images_count,
            text_stats: summary.text_stats.clone(),
        }
    }
}

/// Failures of the local fetch; each maps to one HTTP status.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout while fetching URL (after {}s)", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else {
            FetchError::Http(e.to_string())
        }
    }
}
