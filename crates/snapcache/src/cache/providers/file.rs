//! # File Cache
//!
//! Persistent image cache. Each entry is an image file named after its
//! resource key (`<width>_<height>.jpg`) plus a JSON metadata sidecar.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::types::{CacheLookupResult, CacheMetadata, CacheResult, CacheStatus};
use crate::request::ResourceKey;

use super::CacheProvider;

const IMAGE_DIR: &str = "images";
const IMAGE_EXTENSION: &str = "jpg";
const METADATA_EXTENSION: &str = "meta";
const TEMP_SUFFIX: &str = "tmp";

#[derive(Debug)]
pub struct FileCache {
    cache_dir: PathBuf,
    initialized: OnceCell<()>,
    enabled: bool,
    // Distinguishes temp files of overlapping writes to the same key
    temp_seq: AtomicU64,
}

impl FileCache {
    /// Create a new file cache with the specified directory
    pub fn new(cache_dir: PathBuf, enabled: bool) -> Self {
        Self {
            cache_dir,
            initialized: OnceCell::new(),
            enabled,
            temp_seq: AtomicU64::new(0),
        }
    }

    /// Create the image directory once
    pub(crate) async fn ensure_initialized(&self) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        self.initialized
            .get_or_try_init(|| async {
                fs::create_dir_all(self.image_dir()).await?;
                debug!(dir = ?self.cache_dir, "Initialized file cache");
                Ok::<(), io::Error>(())
            })
            .await?;

        Ok(())
    }

    fn image_dir(&self) -> PathBuf {
        self.cache_dir.join(IMAGE_DIR)
    }

    /// Path where the image for `key` is stored, whether or not it exists yet
    pub fn path_for(&self, key: &ResourceKey) -> PathBuf {
        self.image_dir()
            .join(format!("{}.{IMAGE_EXTENSION}", key.file_stem()))
    }

    fn metadata_path(&self, key: &ResourceKey) -> PathBuf {
        self.image_dir()
            .join(format!("{}.{METADATA_EXTENSION}", key.file_stem()))
    }

    /// Unique scratch file next to `path`, e.g. `200_101.jpg.3.tmp`
    fn temp_path(&self, path: &Path) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{seq}.{TEMP_SUFFIX}"));
        PathBuf::from(name)
    }

    /// Path of the cached image for `key`, if both image and metadata exist
    pub async fn local_path(&self, key: &ResourceKey) -> CacheResult<Option<PathBuf>> {
        if !self.enabled || !self.contains(key).await? {
            return Ok(None);
        }
        Ok(Some(self.path_for(key)))
    }

    async fn read_metadata(path: &Path) -> Option<CacheMetadata> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read cache metadata file");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to parse cache metadata");
                None
            }
        }
    }

    /// Remove both files of an entry, ignoring ones that are already gone
    async fn remove_entry(data_path: &Path, meta_path: &Path) -> CacheResult<()> {
        let data_result = fs::remove_file(data_path).await;
        let meta_result = fs::remove_file(meta_path).await;

        match (data_result, meta_result) {
            (Err(e), _) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = ?data_path, error = %e, "Failed to remove cache data file");
                Err(e)
            }
            (_, Err(e)) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = ?meta_path, error = %e, "Failed to remove cache metadata file");
                Err(e)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl CacheProvider for FileCache {
    async fn contains(&self, key: &ResourceKey) -> CacheResult<bool> {
        if !self.enabled {
            return Ok(false);
        }

        self.ensure_initialized().await?;

        let data_exists = fs::try_exists(self.path_for(key)).await?;
        let meta_exists = fs::try_exists(self.metadata_path(key)).await?;

        Ok(data_exists && meta_exists)
    }

    async fn get(&self, key: &ResourceKey) -> CacheLookupResult {
        if !self.enabled {
            return Ok(None);
        }

        self.ensure_initialized().await?;

        let data_path = self.path_for(key);
        let meta_path = self.metadata_path(key);

        if !fs::try_exists(&data_path).await? || !fs::try_exists(&meta_path).await? {
            return Ok(None);
        }

        let Some(metadata) = Self::read_metadata(&meta_path).await else {
            // Unreadable sidecar, the entry is unusable
            Self::remove_entry(&data_path, &meta_path).await?;
            return Ok(None);
        };

        let data = match fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = ?data_path, error = %e, "Failed to read cache data file");
                return Ok(None);
            }
        };

        if !metadata.matches(&data) {
            warn!(key = %key, path = ?data_path, "Cached image failed checksum verification, dropping it");
            Self::remove_entry(&data_path, &meta_path).await?;
            return Ok(None);
        }

        // Expired entries stay on disk until overwritten or swept
        let status = if metadata.is_expired() {
            CacheStatus::Expired
        } else {
            CacheStatus::Hit
        };

        Ok(Some((Bytes::from(data), metadata, status)))
    }

    async fn put(
        &self,
        key: ResourceKey,
        data: Bytes,
        metadata: CacheMetadata,
    ) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.ensure_initialized().await?;

        let data_path = self.path_for(&key);
        let meta_path = self.metadata_path(&key);

        let metadata_json = serde_json::to_vec(&metadata).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize metadata: {e}"),
            )
        })?;

        // Write to temporary files then rename, so readers never see a partial image
        let temp_data_path = self.temp_path(&data_path);
        let temp_meta_path = self.temp_path(&meta_path);

        if let Err(e) = fs::write(&temp_data_path, &data).await {
            warn!(path = ?temp_data_path, error = %e, "Failed to write cache data file");
            let _ = fs::remove_file(&temp_data_path).await;
            return Err(e);
        }

        if let Err(e) = fs::write(&temp_meta_path, &metadata_json).await {
            warn!(path = ?temp_meta_path, error = %e, "Failed to write cache metadata file");
            let _ = fs::remove_file(&temp_data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_data_path, &data_path).await {
            warn!(
                from = ?temp_data_path,
                to = ?data_path,
                error = %e,
                "Failed to rename temporary data file"
            );
            let _ = fs::remove_file(&temp_data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_meta_path, &meta_path).await {
            warn!(
                from = ?temp_meta_path,
                to = ?meta_path,
                error = %e,
                "Failed to rename temporary metadata file"
            );
            // Image without metadata is not a valid entry
            let _ = fs::remove_file(&data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e);
        }

        debug!(key = %key, path = ?data_path, size = data.len(), "Cached image to file");
        Ok(())
    }

    async fn remove(&self, key: &ResourceKey) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.ensure_initialized().await?;

        Self::remove_entry(&self.path_for(key), &self.metadata_path(key)).await
    }

    async fn clear(&self) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.ensure_initialized().await?;

        let image_dir = self.image_dir();
        let mut entries = match fs::read_dir(&image_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?image_dir, error = %e, "Failed to read cache directory");
                return Err(e);
            }
        };

        let mut entry_count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = ?path, error = %e, "Failed to remove cache file");
            } else {
                entry_count += 1;
            }
        }

        debug!(count = entry_count, "Cleared cache files");
        Ok(())
    }

    async fn sweep(&self) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.ensure_initialized().await?;

        let mut entries = fs::read_dir(self.image_dir()).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let extension = path.extension().and_then(|ext| ext.to_str());

            match extension {
                // Leftovers of interrupted writes
                Some(TEMP_SUFFIX) => {
                    if fs::remove_file(&path).await.is_ok() {
                        removed += 1;
                    }
                }
                Some(METADATA_EXTENSION) => {
                    let expired = Self::read_metadata(&path)
                        .await
                        .is_none_or(|metadata| metadata.is_expired());
                    if expired {
                        let data_path = path.with_extension(IMAGE_EXTENSION);
                        if Self::remove_entry(&data_path, &path).await.is_ok() {
                            removed += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        debug!(removed = removed, "Swept file cache");
        Ok(())
    }
}
