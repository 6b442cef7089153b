//! # Fetch-and-cache task
//!
//! One invocation refreshes the image for one size: optionally drop the cached
//! copy, make sure the image is cached, then publish its path to consumers.
//! The task keeps no state between invocations; the scheduler supplies the
//! attempt number and decides when to run it again.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{ProviderInfo, RetryPolicy};
use crate::error::FetchError;
use crate::fetcher::CachingFetcher;
use crate::notifier::{StateNotifier, WidgetState};
use crate::request::FetchRequest;

/// Result of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// Failed, run again later
    Retryable,
    /// Failed, give up
    Permanent,
}

impl RetryPolicy {
    /// Outcome for a failed attempt number `attempt` (1-based)
    pub fn classify(&self, attempt: u32, error: &FetchError) -> Outcome {
        if error.is_permanent() || attempt >= self.max_attempts {
            Outcome::Permanent
        } else {
            Outcome::Retryable
        }
    }
}

/// Anything the scheduler can run for a request
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self, request: &FetchRequest, attempt: u32) -> Outcome;
}

pub struct FetchAndCacheTask {
    fetcher: Arc<dyn CachingFetcher>,
    notifier: Arc<dyn StateNotifier>,
    provider: ProviderInfo,
    policy: RetryPolicy,
}

impl FetchAndCacheTask {
    pub fn new(
        fetcher: Arc<dyn CachingFetcher>,
        notifier: Arc<dyn StateNotifier>,
        provider: ProviderInfo,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            provider,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn execute(&self, request: &FetchRequest) -> Result<PathBuf, FetchError> {
        let key = request.key();

        if request.is_forced() {
            if let Err(e) = self.fetcher.invalidate(&key).await {
                warn!(key = %key, error = %e, "Cache invalidation failed, fetching anyway");
            }
        }

        let path = self
            .fetcher
            .fetch_and_cache(&key)
            .await?
            .ok_or_else(|| FetchError::CacheMiss(key.to_string()))?;

        let state = WidgetState {
            image_path: path.to_string_lossy().into_owned(),
            source: self.provider.name.clone(),
            source_url: self.provider.url.clone(),
        };
        self.notifier.write_state(&key, state).await?;
        self.notifier.refresh_all().await?;

        Ok(path)
    }
}

#[async_trait]
impl Worker for FetchAndCacheTask {
    async fn run(&self, request: &FetchRequest, attempt: u32) -> Outcome {
        let key = request.key();
        debug!(key = %key, attempt = attempt, forced = request.is_forced(), "Running fetch task");

        match self.execute(request).await {
            Ok(path) => {
                info!(key = %key, path = ?path, attempt = attempt, "Image refreshed");
                Outcome::Succeeded
            }
            Err(e) => {
                let outcome = self.policy.classify(attempt, &e);
                match outcome {
                    Outcome::Permanent => {
                        warn!(key = %key, attempt = attempt, error = %e, "Fetch failed permanently")
                    }
                    _ => warn!(key = %key, attempt = attempt, error = %e, "Fetch failed, will retry"),
                }
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvalidateError, NotifyError};
    use crate::notifier::{RefreshEvent, WidgetStateStore};
    use crate::request::ResourceKey;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Invalidate(String),
        Fetch(String),
    }

    enum FetchBehavior {
        Path(&'static str),
        NoPath,
        Fail,
    }

    struct MockFetcher {
        calls: Mutex<Vec<Call>>,
        behavior: FetchBehavior,
        invalidate_fails: bool,
    }

    impl MockFetcher {
        fn new(behavior: FetchBehavior) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                behavior,
                invalidate_fails: false,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CachingFetcher for MockFetcher {
        async fn invalidate(&self, key: &ResourceKey) -> Result<(), InvalidateError> {
            self.calls.lock().push(Call::Invalidate(key.to_string()));
            if self.invalidate_fails {
                return Err(InvalidateError {
                    key: key.to_string(),
                    source: std::io::Error::other("read-only cache"),
                });
            }
            Ok(())
        }

        async fn fetch_and_cache(
            &self,
            key: &ResourceKey,
        ) -> Result<Option<PathBuf>, FetchError> {
            self.calls.lock().push(Call::Fetch(key.to_string()));
            match self.behavior {
                FetchBehavior::Path(path) => Ok(Some(PathBuf::from(path))),
                FetchBehavior::NoPath => Ok(None),
                FetchBehavior::Fail => Err(FetchError::IoError(std::io::Error::other("offline"))),
            }
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl StateNotifier for FailingNotifier {
        async fn write_state(&self, _: &ResourceKey, _: WidgetState) -> Result<(), NotifyError> {
            Err(NotifyError::IoError(std::io::Error::other("disk full")))
        }

        async fn refresh_all(&self) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    fn task(fetcher: Arc<MockFetcher>, store: Arc<WidgetStateStore>) -> FetchAndCacheTask {
        crate::init_test_tracing!();
        FetchAndCacheTask::new(fetcher, store, ProviderInfo::default())
    }

    #[tokio::test]
    async fn test_success_writes_state_and_refreshes_once() {
        let fetcher = Arc::new(MockFetcher::new(FetchBehavior::Path("/cache/200_101.jpg")));
        let store = Arc::new(WidgetStateStore::in_memory());
        let mut events = store.subscribe();
        let request = FetchRequest::new(200.4, 100.6, false).unwrap();

        let outcome = task(fetcher.clone(), store.clone()).run(&request, 1).await;

        assert_eq!(outcome, Outcome::Succeeded);
        assert_eq!(fetcher.calls(), vec![Call::Fetch("200/101".to_string())]);
        assert_eq!(
            store.get("200/101"),
            Some(WidgetState {
                image_path: "/cache/200_101.jpg".to_string(),
                source: "Picsum Photos".to_string(),
                source_url: "https://picsum.photos/".to_string(),
            })
        );
        assert_eq!(store.snapshot().len(), 1);

        assert_eq!(
            events.try_recv().unwrap(),
            RefreshEvent::Updated("200/101".to_string())
        );
        assert_eq!(events.try_recv().unwrap(), RefreshEvent::All);
        assert!(events.try_recv().is_err(), "refresh must fire exactly once");
    }

    #[tokio::test]
    async fn test_forced_request_invalidates_first() {
        let fetcher = Arc::new(MockFetcher::new(FetchBehavior::Path("/cache/10_10.jpg")));
        let store = Arc::new(WidgetStateStore::in_memory());
        let request = FetchRequest::new(10.0, 10.0, true).unwrap();

        let outcome = task(fetcher.clone(), store).run(&request, 1).await;

        assert_eq!(outcome, Outcome::Succeeded);
        assert_eq!(
            fetcher.calls(),
            vec![
                Call::Invalidate("10/10".to_string()),
                Call::Fetch("10/10".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_invalidation_failure_is_not_fatal() {
        let mut mock = MockFetcher::new(FetchBehavior::Path("/cache/10_10.jpg"));
        mock.invalidate_fails = true;
        let fetcher = Arc::new(mock);
        let store = Arc::new(WidgetStateStore::in_memory());
        let request = FetchRequest::new(10.0, 10.0, true).unwrap();

        let outcome = task(fetcher.clone(), store.clone()).run(&request, 1).await;

        assert_eq!(outcome, Outcome::Succeeded);
        assert_eq!(fetcher.calls().len(), 2);
        assert!(store.get("10/10").is_some());
    }

    #[tokio::test]
    async fn test_failures_retry_until_ceiling() {
        let fetcher = Arc::new(MockFetcher::new(FetchBehavior::Fail));
        let store = Arc::new(WidgetStateStore::in_memory());
        let task = task(fetcher, store.clone());
        let request = FetchRequest::new(64.0, 64.0, false).unwrap();

        for attempt in 1..10 {
            assert_eq!(task.run(&request, attempt).await, Outcome::Retryable);
        }
        assert_eq!(task.run(&request, 10).await, Outcome::Permanent);
        assert_eq!(task.run(&request, 11).await, Outcome::Permanent);
        assert!(store.snapshot().is_empty(), "failures never touch state");
    }

    #[tokio::test]
    async fn test_success_without_path_is_never_success() {
        let fetcher = Arc::new(MockFetcher::new(FetchBehavior::NoPath));
        let store = Arc::new(WidgetStateStore::in_memory());
        let mut events = store.subscribe();
        let task = task(fetcher, store.clone());
        let request = FetchRequest::new(5.0, 5.0, false).unwrap();

        assert_eq!(task.run(&request, 1).await, Outcome::Retryable);
        assert_eq!(task.run(&request, 10).await, Outcome::Permanent);
        assert!(store.snapshot().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notifier_failure_is_classified() {
        let fetcher = Arc::new(MockFetcher::new(FetchBehavior::Path("/cache/1_1.jpg")));
        let task = FetchAndCacheTask::new(fetcher, Arc::new(FailingNotifier), ProviderInfo::default())
            .with_retry_policy(RetryPolicy { max_attempts: 2 });
        let request = FetchRequest::new(1.0, 1.0, false).unwrap();

        assert_eq!(task.run(&request, 1).await, Outcome::Retryable);
        assert_eq!(task.run(&request, 2).await, Outcome::Permanent);
    }

    #[test]
    fn test_classify_permanent_errors_skip_retries() {
        let policy = RetryPolicy::default();
        let err = FetchError::UrlError("bad".to_string());
        assert_eq!(policy.classify(1, &err), Outcome::Permanent);

        let err = FetchError::CacheMiss("1/1".to_string());
        assert_eq!(policy.classify(1, &err), Outcome::Retryable);
        assert_eq!(policy.classify(10, &err), Outcome::Permanent);
    }
}
