//! Service configuration for both tiers.
//!
//! The binary fills these from the command line; library code only ever sees
//! the structs.

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_SCRAPING_PORT: u16 = 8000;
pub const DEFAULT_PROCESSING_PORT: u16 = 8001;
pub const DEFAULT_PROCESSING_HOST: &str = "localhost";

/// Establishing a back-tier connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Whole round trip of one sub-task (connect + send + receive).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Liveness probe round trip.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);
/// Local page fetch on the front tier.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_RATE_LIMIT: usize = 10;
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);
/// How often the scraping server drops expired cache entries and idle rate-limit domains.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Number of worker slots when none is configured.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Back tier: where to listen and how many tasks may run at once.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub bind_addr: SocketAddr,
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PROCESSING_PORT)),
            workers: default_worker_count(),
        }
    }
}

/// Front tier: HTTP listener, back-tier location and timeouts.
#[derive(Debug, Clone)]
pub struct ScrapingConfig {
    pub bind_addr: SocketAddr,
    pub processing_host: String,
    pub processing_port: u16,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub fetch_timeout: Duration,
    pub cache_ttl: Duration,
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub sweep_interval: Duration,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_SCRAPING_PORT)),
            processing_host: DEFAULT_PROCESSING_HOST.to_string(),
            processing_port: DEFAULT_PROCESSING_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: DEFAULT_RATE_WINDOW,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
