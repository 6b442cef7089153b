// Image Fetcher: resolves a resource key to a cached local file, downloading it when needed.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::cache::{CacheManager, CacheStatus, metadata_from_headers};
use crate::error::{FetchError, InvalidateError};
use crate::request::ResourceKey;
use crate::FetcherConfig;

/// A fetcher backed by a local cache.
#[async_trait]
pub trait CachingFetcher: Send + Sync {
    /// Drop any cached copy of `key`. Best-effort.
    async fn invalidate(&self, key: &ResourceKey) -> Result<(), InvalidateError>;

    /// Make sure `key` is cached and return its local path.
    ///
    /// `Ok(None)` means the fetch reported success but the cache has no file
    /// for the key.
    async fn fetch_and_cache(&self, key: &ResourceKey) -> Result<Option<PathBuf>, FetchError>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &FetcherConfig) -> Result<Client, FetchError> {
    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.read_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.read_timeout);
    }

    client_builder.build().map_err(FetchError::from)
}

/// Downloads `<base_url>/<width>/<height>` into a [`CacheManager`]
pub struct HttpImageFetcher {
    http_client: Client,
    config: Arc<FetcherConfig>,
    cache: Arc<CacheManager>,
}

impl HttpImageFetcher {
    pub fn new(http_client: Client, config: Arc<FetcherConfig>, cache: Arc<CacheManager>) -> Self {
        Self {
            http_client,
            config,
            cache,
        }
    }

    /// Build the client and cache described by `config`
    pub async fn from_config(config: FetcherConfig) -> Result<Self, FetchError> {
        let http_client = create_client(&config)?;
        let cache = Arc::new(CacheManager::new(config.cache_config.clone()).await?);
        Ok(Self::new(http_client, Arc::new(config), cache))
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Path of a fresh cached copy, if there is one
    async fn cached_path(&self, key: &ResourceKey) -> Result<Option<PathBuf>, FetchError> {
        match self.cache.get(key).await? {
            Some((_, _, CacheStatus::Hit)) => Ok(self.cache.local_path(key).await?),
            Some((_, _, CacheStatus::Expired)) => {
                debug!(key = %key, "Cached image expired, refetching");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CachingFetcher for HttpImageFetcher {
    async fn invalidate(&self, key: &ResourceKey) -> Result<(), InvalidateError> {
        self.cache
            .remove(key)
            .await
            .map_err(|source| InvalidateError {
                key: key.to_string(),
                source,
            })?;
        debug!(key = %key, "Invalidated cached image");
        Ok(())
    }

    async fn fetch_and_cache(&self, key: &ResourceKey) -> Result<Option<PathBuf>, FetchError> {
        if let Some(path) = self.cached_path(key).await? {
            debug!(key = %key, path = ?path, "Serving image from cache");
            return Ok(Some(path));
        }

        let url = key.url(&self.config.base_url)?;
        let response = self.http_client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::StatusCode(status));
        }

        // Picsum answers with a redirect to the concrete image
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(FetchError::EmptyBody(url.to_string()));
        }

        let metadata = metadata_from_headers(&headers, &data, self.cache.config().default_ttl);
        let size = data.len();
        self.cache.put(*key, data, metadata).await?;

        info!(key = %key, url = %final_url, size = size, "Downloaded image");
        Ok(self.cache.local_path(key).await?)
    }
}
