//! # Cache Types
//!
//! This module defines common types used across the caching system.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

/// Status of a cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Resource found in cache and is valid
    Hit,
    /// Resource found but has expired
    Expired,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Metadata stored next to every cached image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the resource was cached
    pub cached_at: u64,
    /// When the resource expires
    pub expires_at: Option<u64>,
    /// ETag value if available
    pub etag: Option<String>,
    /// Last-Modified header value if available
    pub last_modified: Option<String>,
    /// Content type of the resource
    pub content_type: Option<String>,
    /// Size of the cached resource in bytes
    pub size: u64,
    /// Hex encoded SHA-256 of the cached bytes
    #[serde(default)]
    pub checksum: Option<String>,
}

impl CacheMetadata {
    /// Create new metadata for a resource
    pub fn new(size: u64) -> Self {
        Self {
            cached_at: unix_now(),
            expires_at: None,
            etag: None,
            last_modified: None,
            content_type: None,
            size,
            checksum: None,
        }
    }

    /// Metadata describing `data`, including its size and checksum
    pub fn for_content(data: &Bytes) -> Self {
        Self::new(data.len() as u64).with_checksum(checksum(data))
    }

    /// Set the expiration time
    pub fn with_expiration(mut self, duration: Duration) -> Self {
        self.expires_at = Some(self.cached_at + duration.as_secs());
        self
    }

    /// Set the ETag value as an Option
    pub fn with_etag_option(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Set the Last-Modified value as an Option
    pub fn with_last_modified_option(mut self, last_modified: Option<String>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Set the content type as an Option
    pub fn with_content_type_option(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Check if the resource has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= unix_now())
    }

    /// Whether `data` matches the recorded checksum.
    ///
    /// Entries written without a checksum always match.
    pub fn matches(&self, data: &[u8]) -> bool {
        match &self.checksum {
            Some(expected) => expected.eq_ignore_ascii_case(&checksum(data)),
            None => true,
        }
    }
}

/// Hex encoded SHA-256 digest
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Configuration for the cache system
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Path for disk cache storage
    pub disk_cache_path: Option<PathBuf>,
    /// Maximum size of memory cache in bytes, 0 disables the memory layer
    pub max_memory_cache_size: u64,
    /// How long a fetched image stays fresh
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disk_cache_path: None, // If None, we'll use system temp dir
            max_memory_cache_size: 30 * 1024 * 1024, // 30MB
            default_ttl: Duration::from_secs(24 * 3600), // 1 day
        }
    }
}

/// Result of a cache operation
pub type CacheResult<T> = std::result::Result<T, std::io::Error>;

/// A type representing the result of a cache lookup operation
pub type CacheLookupResult = CacheResult<Option<(Bytes, CacheMetadata, CacheStatus)>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_matches_content() {
        let data = Bytes::from_static(b"jpeg bytes");
        let meta = CacheMetadata::for_content(&data);
        assert_eq!(meta.size, 10);
        assert!(meta.matches(&data));
        assert!(!meta.matches(b"other bytes"));
        assert!(CacheMetadata::new(0).matches(b"anything"));
    }

    #[test]
    fn test_expiration() {
        let fresh = CacheMetadata::new(1).with_expiration(Duration::from_secs(60));
        assert!(!fresh.is_expired());

        let mut stale = CacheMetadata::new(1);
        stale.expires_at = Some(stale.cached_at.saturating_sub(10));
        assert!(stale.is_expired());

        assert!(!CacheMetadata::new(1).is_expired());
    }

    #[test]
    fn test_metadata_without_checksum_deserializes() {
        let json = r#"{"cached_at":1,"expires_at":null,"etag":null,"last_modified":null,"content_type":"image/jpeg","size":3}"#;
        let meta: CacheMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.checksum, None);
        assert_eq!(meta.content_type.as_deref(), Some("image/jpeg"));
    }
}
