//! # Cache Manager
//!
//! This module provides the main cache manager that coordinates between memory and file caches.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io;
use tracing::{debug, warn};

use crate::cache::providers::file::FileCache;
use crate::cache::providers::memory::MemoryCache;
use crate::cache::providers::provider::CacheProvider;
use crate::cache::types::{CacheConfig, CacheLookupResult, CacheMetadata, CacheResult};
use crate::request::ResourceKey;

/// Cache manager handling both memory and file caching
#[derive(Clone)]
pub struct CacheManager {
    memory_cache: Option<Arc<MemoryCache>>,
    file_cache: Arc<FileCache>,
    config: Arc<CacheConfig>,
}

impl CacheManager {
    /// Create a new cache manager with the specified configuration
    pub async fn new(config: CacheConfig) -> io::Result<Self> {
        let cache_dir = config
            .disk_cache_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("snapcache"));
        let config = Arc::new(CacheConfig {
            disk_cache_path: Some(cache_dir.clone()),
            ..config
        });

        let memory_cache = (config.enabled && config.max_memory_cache_size > 0).then(|| {
            Arc::new(MemoryCache::new(
                config.max_memory_cache_size,
                config.default_ttl.as_secs(),
            ))
        });

        let file_cache = Arc::new(FileCache::new(cache_dir, config.enabled));

        // Initialize the cache directories in advance
        file_cache.ensure_initialized().await?;

        Ok(Self {
            memory_cache,
            file_cache,
            config,
        })
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &ResourceKey) -> CacheLookupResult {
        if !self.config.enabled {
            return Ok(None);
        }

        if let Some(memory_cache) = &self.memory_cache {
            if let Some(entry) = memory_cache.get(key).await? {
                return Ok(Some(entry));
            }
        }

        if let Some((data, metadata, status)) = self.file_cache.get(key).await? {
            // Promote to memory for faster access next time
            if let Some(memory_cache) = &self.memory_cache {
                let _ = memory_cache
                    .put(*key, data.clone(), metadata.clone())
                    .await;
            }

            return Ok(Some((data, metadata, status)));
        }

        Ok(None)
    }

    /// Put a value in the cache
    pub async fn put(
        &self,
        key: ResourceKey,
        data: Bytes,
        metadata: CacheMetadata,
    ) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        if let Some(memory_cache) = &self.memory_cache {
            let _ = memory_cache
                .put(key, data.clone(), metadata.clone())
                .await;
        }

        self.file_cache.put(key, data, metadata).await
    }

    /// Remove a key from cache
    pub async fn remove(&self, key: &ResourceKey) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let mem_result = match &self.memory_cache {
            Some(memory_cache) => memory_cache.remove(key).await,
            None => Ok(()),
        };
        let file_result = self.file_cache.remove(key).await;

        // Return file cache error if any, otherwise memory cache error if any
        file_result.and(mem_result)
    }

    /// Clear all entries
    pub async fn clear(&self) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let mem_result = match &self.memory_cache {
            Some(memory_cache) => memory_cache.clear().await,
            None => Ok(()),
        };
        let file_result = self.file_cache.clear().await;

        file_result.and(mem_result)
    }

    /// Check if a key exists in the cache
    pub async fn contains(&self, key: &ResourceKey) -> CacheResult<bool> {
        if !self.config.enabled {
            return Ok(false);
        }

        if let Some(memory_cache) = &self.memory_cache {
            if memory_cache.contains(key).await? {
                return Ok(true);
            }
        }

        self.file_cache.contains(key).await
    }

    /// Filesystem path of the cached image for `key`, if it is on disk
    pub async fn local_path(&self, key: &ResourceKey) -> CacheResult<Option<PathBuf>> {
        if !self.config.enabled {
            return Ok(None);
        }
        self.file_cache.local_path(key).await
    }

    /// Get configuration reference
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Drop expired entries from both layers
    pub async fn maintain(&self) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        if let Some(memory_cache) = &self.memory_cache {
            memory_cache.sweep().await?;
        }
        self.file_cache.sweep().await?;

        debug!("Cache maintenance finished");
        Ok(())
    }

    /// Start a background maintenance task
    pub fn start_maintenance_task(
        self: Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.maintain().await {
                    warn!(error = %e, "Cache maintenance error");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStatus;
    use std::time::Duration;

    fn config(dir: &tempfile::TempDir) -> CacheConfig {
        CacheConfig {
            disk_cache_path: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        }
    }

    fn entry(content: &'static [u8]) -> (Bytes, CacheMetadata) {
        let data = Bytes::from_static(content);
        let metadata = CacheMetadata::for_content(&data).with_expiration(Duration::from_secs(60));
        (data, metadata)
    }

    #[tokio::test]
    async fn test_put_writes_both_layers() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(config(&dir)).await.unwrap();
        let key = ResourceKey::new(200, 101);
        let (data, metadata) = entry(b"image");

        manager.put(key, data.clone(), metadata).await.unwrap();

        assert!(manager.contains(&key).await.unwrap());
        let path = manager.local_path(&key).await.unwrap().expect("on disk");
        assert!(path.ends_with("images/200_101.jpg"));

        let (got, _, status) = manager.get(&key).await.unwrap().expect("cached");
        assert_eq!(got, data);
        assert_eq!(status, CacheStatus::Hit);
    }

    #[tokio::test]
    async fn test_disk_entry_survives_new_manager() {
        let dir = tempfile::tempdir().unwrap();
        let key = ResourceKey::new(10, 20);
        let (data, metadata) = entry(b"persisted");

        {
            let manager = CacheManager::new(config(&dir)).await.unwrap();
            manager.put(key, data.clone(), metadata).await.unwrap();
        }

        let manager = CacheManager::new(config(&dir)).await.unwrap();
        let (got, _, _) = manager.get(&key).await.unwrap().expect("read from disk");
        assert_eq!(got, data);
    }

    #[tokio::test]
    async fn test_remove_clears_both_layers() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(config(&dir)).await.unwrap();
        let key = ResourceKey::new(1, 1);
        let (data, metadata) = entry(b"gone soon");

        manager.put(key, data, metadata).await.unwrap();
        manager.remove(&key).await.unwrap();

        assert!(manager.get(&key).await.unwrap().is_none());
        assert!(manager.local_path(&key).await.unwrap().is_none());
        // Removing twice is fine
        manager.remove(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_without_memory_layer() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(CacheConfig {
            max_memory_cache_size: 0,
            ..config(&dir)
        })
        .await
        .unwrap();
        let key = ResourceKey::new(4, 4);
        let (data, metadata) = entry(b"disk only");

        manager.put(key, data.clone(), metadata).await.unwrap();
        let (got, _, _) = manager.get(&key).await.unwrap().expect("cached");
        assert_eq!(got, data);

        manager.clear().await.unwrap();
        assert!(!manager.contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(CacheConfig {
            enabled: false,
            ..config(&dir)
        })
        .await
        .unwrap();
        let key = ResourceKey::new(2, 2);
        let (data, metadata) = entry(b"ignored");

        manager.put(key, data, metadata).await.unwrap();
        assert!(manager.get(&key).await.unwrap().is_none());
        assert!(manager.local_path(&key).await.unwrap().is_none());
        manager.maintain().await.unwrap();
    }

    #[tokio::test]
    async fn test_default_path_is_temp_dir() {
        let manager = CacheManager::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        })
        .await
        .unwrap();
        assert_eq!(
            manager.config().disk_cache_path,
            Some(std::env::temp_dir().join("snapcache"))
        );
    }
}
