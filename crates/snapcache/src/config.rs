use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::CacheConfig;

const DEFAULT_USER_AGENT: &str = concat!("snapcache/", env!("CARGO_PKG_VERSION"));

/// Default image provider endpoint
pub const PICSUM_BASE_URL: &str = "https://picsum.photos";

/// Attribution written next to every image path in consumer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Display name, e.g. "Picsum Photos"
    pub name: String,
    /// Public page of the provider
    pub url: String,
}

impl Default for ProviderInfo {
    fn default() -> Self {
        Self {
            name: "Picsum Photos".to_owned(),
            url: "https://picsum.photos/".to_owned(),
        }
    }
}

/// Configurable options for the image fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Base URL the `/<width>/<height>` path is appended to
    pub base_url: String,

    /// Attribution for fetched images
    pub provider: ProviderInfo,

    /// Cache configuration
    pub cache_config: CacheConfig,

    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept
    pub read_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: PICSUM_BASE_URL.to_owned(),
            provider: ProviderInfo::default(),
            cache_config: CacheConfig::default(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: FetcherConfig::get_default_headers(),
        }
    }
}

impl FetcherConfig {
    pub fn builder() -> crate::builder::FetcherConfigBuilder {
        crate::builder::FetcherConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("image/jpeg,image/webp,image/*;q=0.8,*/*;q=0.5"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}

/// Retry ceiling shared by the task and the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt number (1-based) at which failures become permanent
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 10 }
    }
}

/// Configuration for the retry scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay before the second attempt; doubles on every further retry
    pub backoff_base: Duration,
    /// Upper bound for a single retry delay
    pub max_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(30),
            max_backoff: Duration::from_secs(5 * 3600),
        }
    }
}

impl SchedulerConfig {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.backoff_base.checked_mul(factor))
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}
