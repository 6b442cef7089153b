//! # Snapcache
//!
//! Keeps a locally cached photo per requested size and tells consumers where
//! to find it.
//!
//! ## Features
//!
//! - Size-derived resource keys shared by the remote URL, the cache slot and
//!   consumer state
//! - Two-level image cache (memory + disk) with expiry and checksums
//! - HTTP fetcher for Picsum-style `/<width>/<height>` endpoints
//! - Stateless fetch-and-cache task with a bounded retry policy
//! - Retry scheduler with per-size deduplication, backoff and cancellation
//! - JSON-backed consumer state with refresh notifications

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod notifier;
pub mod request;
pub mod scheduler;
pub mod task;

#[cfg(test)]
mod test_utils;

pub use builder::FetcherConfigBuilder;
pub use cache::{CacheConfig, CacheManager};
pub use config::{FetcherConfig, ProviderInfo, RetryPolicy, SchedulerConfig};
pub use error::{FetchError, InvalidateError, NotifyError, RequestError};
pub use fetcher::{CachingFetcher, HttpImageFetcher, create_client};
pub use notifier::{RefreshEvent, StateNotifier, WidgetState, WidgetStateStore};
pub use request::{FetchRequest, ResourceKey};
pub use scheduler::{DedupPolicy, JobHandle, JobState, RetryScheduler, Submission};
pub use task::{FetchAndCacheTask, Outcome, Worker};
