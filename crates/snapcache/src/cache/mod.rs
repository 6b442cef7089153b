//! # Cache System
//!
//! Two-level image cache keyed by [`ResourceKey`](crate::request::ResourceKey):
//! a bounded in-memory layer in front of a directory of image files with
//! JSON metadata sidecars.

mod manager;
pub mod providers;
mod types;
mod utils;

pub use manager::CacheManager;
pub use types::{CacheConfig, CacheLookupResult, CacheMetadata, CacheResult, CacheStatus, checksum};
pub use utils::metadata_from_headers;

pub use providers::{CacheProvider, FileCache, MemoryCache};
