//! # Memory Cache Provider
//!
//! This module provides an in-memory cache implementation using Moka caching.

use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::cache::providers::CacheProvider;
use crate::cache::types::{CacheLookupResult, CacheMetadata, CacheResult, CacheStatus};
use crate::request::ResourceKey;

/// Entry in the memory cache
#[derive(Clone)]
struct CacheEntry {
    /// Cached image bytes
    data: Bytes,
    /// Metadata for the cached content
    metadata: CacheMetadata,
}

/// Memory cache provider implementation using Moka
#[derive(Clone)]
pub struct MemoryCache {
    /// Moka cache for storing entries
    cache: MokaCache<ResourceKey, CacheEntry>,
    /// Maximum size for this cache in bytes
    max_size: u64,
}

impl MemoryCache {
    /// Create a new memory cache with the specified size limit
    pub fn new(max_size_bytes: u64, ttl_seconds: u64) -> Self {
        if max_size_bytes == 0 {
            panic!("Memory cache size must be greater than zero");
        }

        // Size based eviction
        let mut builder = MokaCache::builder()
            .weigher(|_k, v: &CacheEntry| v.data.len().try_into().unwrap_or(u32::MAX))
            .max_capacity(max_size_bytes);

        if ttl_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(ttl_seconds));
        }

        let cache = builder.build();

        debug!(
            max_size = max_size_bytes,
            ttl_seconds = ttl_seconds,
            "Memory cache created"
        );

        Self {
            cache,
            max_size: max_size_bytes,
        }
    }
}

#[async_trait::async_trait]
impl CacheProvider for MemoryCache {
    async fn contains(&self, key: &ResourceKey) -> CacheResult<bool> {
        Ok(self.cache.contains_key(key))
    }

    async fn get(&self, key: &ResourceKey) -> CacheLookupResult {
        let Some(entry) = self.cache.get(key).await else {
            return Ok(None);
        };

        // Moka only knows the global TTL, per-entry expiry lives in the metadata
        if entry.metadata.is_expired() {
            debug!(key = %key, "Memory cache entry expired");
            self.cache.invalidate(key).await;
            return Ok(Some((entry.data, entry.metadata, CacheStatus::Expired)));
        }

        Ok(Some((entry.data, entry.metadata, CacheStatus::Hit)))
    }

    async fn put(
        &self,
        key: ResourceKey,
        data: Bytes,
        metadata: CacheMetadata,
    ) -> CacheResult<()> {
        let size = data.len() as u64;

        // A single entry shouldn't be larger than the total cache size
        if size > self.max_size {
            warn!(
                key = %key,
                size = size,
                max_size = self.max_size,
                "Entry too large for memory cache, skipping"
            );
            return Ok(());
        }

        self.cache.insert(key, CacheEntry { data, metadata }).await;
        Ok(())
    }

    async fn remove(&self, key: &ResourceKey) -> CacheResult<()> {
        if self.cache.remove(key).await.is_some() {
            debug!(key = %key, "Removed entry from memory cache");
        }
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;

        debug!("Memory cache cleared");
        Ok(())
    }

    async fn sweep(&self) -> CacheResult<()> {
        // Eagerly evict anything past Moka's TTL
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}
