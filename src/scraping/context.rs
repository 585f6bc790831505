//! Request context for the scraping service.
//!
//! Everything a request handler needs beyond its own input lives in one
//! [`ScrapeContext`], built at startup and shared through the router. There is
//! no process-wide mutable state.

use super::fetcher::PageFetcher;
use super::types::FetchError;
use crate::config::ScrapingConfig;
use crate::orchestrator::{ProcessingClient, TaskOrchestrator};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

pub struct ScrapeContext {
    pub fetcher: PageFetcher,
    pub orchestrator: TaskOrchestrator,
    pub cache: ResponseCache,
    pub limiter: RateLimiter,
}

impl ScrapeContext {
    pub fn new(config: &ScrapingConfig) -> Result<Arc<Self>, FetchError> {
        let fetcher = PageFetcher::new(config.fetch_timeout)?;
        let orchestrator = TaskOrchestrator::new(ProcessingClient::from_config(config));

        Ok(Arc::new(Self {
            fetcher,
            orchestrator,
            cache: ResponseCache::new(config.cache_ttl),
            limiter: RateLimiter::new(config.rate_limit, config.rate_window),
        }))
    }

    pub fn client(&self) -> &ProcessingClient {
        self.orchestrator.client()
    }

    /// Drops expired cache entries and rate-limit domains with no live requests.
    ///
    /// # Returns
    /// `(cache entries removed, domains removed)`.
    pub fn sweep(&self) -> (usize, usize) {
        let expired = self.cache.purge_expired();
        let idle = self.limiter.purge_idle();
        if expired > 0 || idle > 0 {
            tracing::debug!("Swept {} cache entries and {} idle domains", expired, idle);
        }
        (expired, idle)
    }

    /// Runs [`sweep`](Self::sweep) every `every` until the context is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let context = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match context.upgrade() {
                    Some(context) => {
                        context.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}

// ============================================================
// Response cache
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage, two decimals.
    pub hit_rate: f64,
    pub ttl_seconds: u64,
}

/// TTL cache of finished scrape reports, keyed by the requested URL.
pub struct ResponseCache {
    entries: DashMap<String, (Instant, Value)>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, url: &str) -> Option<Value> {
        let lookup = self
            .entries
            .get(url)
            .map(|entry| (entry.0.elapsed() <= self.ttl).then(|| entry.1.clone()));

        match lookup {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                // Expired; the read guard is gone by now
                self.entries.remove(url);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, url: &str, value: Value) {
        self.entries.insert(url.to_string(), (Instant::now(), value));
    }

    pub fn remove(&self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Drops expired entries and returns how many went.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (stored, _)| stored.elapsed() <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64 * 10_000.0).round() / 100.0
        };

        CacheStats {
            size: self.entries.len(),
            hits,
            misses,
            hit_rate,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

// ============================================================
// Rate limiter
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub domains: usize,
    pub max_requests: usize,
    pub window_seconds: u64,
    pub requests_by_domain: BTreeMap<String, usize>,
}

/// Sliding-window request limit per domain.
pub struct RateLimiter {
    requests: DashMap<String, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// `host[:port]` of `url`, or the raw string when it does not parse.
    pub fn domain_of(url: &str) -> String {
        match Url::parse(url) {
            Ok(parsed) => match (parsed.host_str(), parsed.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => url.to_string(),
            },
            Err(_) => url.to_string(),
        }
    }

    /// Records a request for `url`'s domain if the window has room.
    ///
    /// # Returns
    /// * `Ok(())` if the request was admitted and counted.
    /// * `Err(wait)` with the time until the oldest request leaves the window.
    pub fn try_acquire(&self, url: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut window = self.requests.entry(Self::domain_of(url)).or_default();
        self.evict(&mut window, now);

        if window.len() < self.max_requests {
            window.push_back(now);
            return Ok(());
        }

        let wait = window
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default();
        Err(wait)
    }

    pub fn can_request(&self, url: &str) -> bool {
        self.wait_time(url).is_zero()
    }

    /// How long until `url`'s domain may be requested again.
    pub fn wait_time(&self, url: &str) -> Duration {
        let now = Instant::now();
        let Some(mut window) = self.requests.get_mut(&Self::domain_of(url)) else {
            return Duration::ZERO;
        };
        self.evict(&mut window, now);

        if window.len() < self.max_requests {
            return Duration::ZERO;
        }
        window
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default()
    }

    /// Clears one domain, or every domain when `url` is `None`.
    pub fn reset(&self, url: Option<&str>) {
        match url {
            Some(url) => {
                self.requests.remove(&Self::domain_of(url));
            }
            None => self.requests.clear(),
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let requests_by_domain: BTreeMap<String, usize> = self
            .requests
            .iter()
            .map(|entry| {
                let live = entry
                    .value()
                    .iter()
                    .filter(|at| now.duration_since(**at) < self.window)
                    .count();
                (entry.key().clone(), live)
            })
            .collect();

        RateLimiterStats {
            domains: requests_by_domain.len(),
            max_requests: self.max_requests,
            window_seconds: self.window.as_secs(),
            requests_by_domain,
        }
    }

    /// Forgets domains whose window holds no live requests; returns how many went.
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests.retain(|_, window| {
            self.evict(window, now);
            !window.is_empty()
        });
        before.saturating_sub(self.requests.len())
    }

    fn evict(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
