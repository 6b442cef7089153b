//! # Builder for FetcherConfig
//!
//! Fluent construction of [`FetcherConfig`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use snapcache_engine::FetcherConfig;
//!
//! let config = FetcherConfig::builder()
//!     .with_base_url("https://picsum.photos")
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MyWidget/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .with_cache_dir("/tmp/widget-cache")
//!     .build();
//!
//! assert_eq!(config.timeout, Duration::from_secs(60));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::ProviderInfo;
use crate::{CacheConfig, FetcherConfig};

/// Builder for creating FetcherConfig instances with a fluent API
#[derive(Debug, Clone, Default)]
pub struct FetcherConfigBuilder {
    config: FetcherConfig,
}

impl FetcherConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL sizes are appended to
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Set the attribution written into consumer state
    pub fn with_provider(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.config.provider = ProviderInfo {
            name: name.into(),
            url: url.into(),
        };
        self
    }

    /// Set the cache configuration
    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.config.cache_config = cache_config;
        self
    }

    /// Store cached images under `dir`
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_config.disk_cache_path = Some(dir.into());
        self
    }

    /// Set how long fetched images stay fresh
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_config.default_ttl = ttl;
        self
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set how long idle pooled connections are kept
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header; invalid names or values are ignored
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Merge headers into the defaults; later values win
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Build the final FetcherConfig
    pub fn build(self) -> FetcherConfig {
        self.config
    }
}
