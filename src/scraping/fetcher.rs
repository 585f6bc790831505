use super::types::{FetchError, FetchedPage};

use std::time::Duration;
use url::Url;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 10;

/// Parses `raw` and accepts only absolute http(s) URLs with a host.
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

/// Local page download for the front tier.
///
/// Any HTTP status is a successful fetch; the status is reported alongside the
/// body. Only transport failures are errors.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, timeout })
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedPage, FetchError> {
        let url = validate_url(raw_url)?;
        tracing::info!("Fetching: {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let html = response.text().await.map_err(|e| self.classify(e))?;

        tracing::info!("Fetched {}: {}, {} bytes", url, status, html.len());

        Ok(FetchedPage {
            url: url.to_string(),
            status,
            html,
        })
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            tracing::error!("Timeout fetching page after {:?}", self.timeout);
            FetchError::Timeout(self.timeout)
        } else {
            tracing::error!("Error fetching page: {}", error);
            error.into()
        }
    }
}
