// Retry Scheduler: runs fetch requests with per-key deduplication, retries with backoff and cancellation by tag.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::request::{FetchRequest, ResourceKey};
use crate::task::{Outcome, Worker};

/// What to do when a job for the same key is already pending or running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Ignore the new submission
    Keep,
    /// Cancel the existing job and run the new one
    Replace,
}

impl DedupPolicy {
    /// Forced requests replace, everything else keeps
    pub fn for_request(request: &FetchRequest) -> Self {
        if request.is_forced() {
            DedupPolicy::Replace
        } else {
            DedupPolicy::Keep
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for its first run or for the next retry
    Pending,
    Running,
    Succeeded,
    /// Gave up after a permanent failure
    Permanent,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Permanent | JobState::Cancelled
        )
    }
}

/// How a submission was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Enqueued,
    /// An equivalent job was already live; the handle refers to it
    Kept,
    /// A live job for the key was cancelled in favour of this one
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JobStatus {
    state: JobState,
    attempts: u32,
}

/// Observer for one scheduled job
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: u64,
    key: ResourceKey,
    submission: Submission,
    status: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn submission(&self) -> Submission {
        self.submission
    }

    pub fn state(&self) -> JobState {
        self.status.borrow().state
    }

    /// Number of attempts started so far
    pub fn attempts(&self) -> u32 {
        self.status.borrow().attempts
    }

    /// Wait until the job reaches a terminal state
    pub async fn wait(&self) -> JobState {
        let mut status = self.status.clone();
        let terminal = status
            .wait_for(|s| s.state.is_terminal())
            .await
            .map(|s| s.state);
        // Sender gone without a terminal state means the runtime shut down
        terminal.unwrap_or_else(|_| status.borrow().state)
    }
}

struct ActiveJob {
    id: u64,
    tag: String,
    token: CancellationToken,
    handle: JobHandle,
}

type Registry = Arc<Mutex<HashMap<ResourceKey, ActiveJob>>>;

/// In-process job queue keyed by [`ResourceKey`].
///
/// Must be used from within a tokio runtime. Dropping the scheduler cancels
/// every live job.
pub struct RetryScheduler {
    worker: Arc<dyn Worker>,
    config: Arc<SchedulerConfig>,
    jobs: Registry,
    next_id: AtomicU64,
    root: CancellationToken,
}

impl RetryScheduler {
    pub fn new(worker: Arc<dyn Worker>, config: SchedulerConfig) -> Self {
        Self {
            worker,
            config: Arc::new(config),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            root: CancellationToken::new(),
        }
    }

    /// Schedule `request`, deduplicating by its resource key.
    ///
    /// Forced requests replace any live job for the key; other requests are
    /// dropped in favour of a live one.
    pub fn submit(&self, request: FetchRequest, tag: impl Into<String>) -> JobHandle {
        let key = request.key();
        let policy = DedupPolicy::for_request(&request);
        let mut submission = Submission::Enqueued;

        let mut jobs = self.jobs.lock();
        if let Some(existing) = jobs.get(&key) {
            // A cancelled job may linger until its driver wakes; it is not live
            if !existing.token.is_cancelled() && !existing.handle.state().is_terminal() {
                match policy {
                    DedupPolicy::Keep => {
                        debug!(key = %key, job = existing.id, "Job already scheduled, keeping it");
                        let mut handle = existing.handle.clone();
                        handle.submission = Submission::Kept;
                        return handle;
                    }
                    DedupPolicy::Replace => {
                        debug!(key = %key, job = existing.id, "Replacing scheduled job");
                        existing.token.cancel();
                        submission = Submission::Replaced;
                    }
                }
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        let (status_tx, status_rx) = watch::channel(JobStatus {
            state: JobState::Pending,
            attempts: 0,
        });
        let handle = JobHandle {
            id,
            key,
            submission,
            status: status_rx,
        };

        jobs.insert(
            key,
            ActiveJob {
                id,
                tag: tag.into(),
                token: token.clone(),
                handle: handle.clone(),
            },
        );
        drop(jobs);

        info!(key = %key, job = id, forced = request.is_forced(), "Scheduled fetch job");
        tokio::spawn(Self::drive(
            Arc::clone(&self.worker),
            Arc::clone(&self.config),
            Arc::clone(&self.jobs),
            request,
            id,
            token,
            status_tx,
        ));

        handle
    }

    /// Cancel every live job carrying `tag`. Returns how many were cancelled.
    pub fn cancel(&self, tag: &str) -> usize {
        let jobs = self.jobs.lock();
        let mut cancelled = 0;
        for job in jobs.values().filter(|job| job.tag == tag) {
            if !job.token.is_cancelled() {
                job.token.cancel();
                cancelled += 1;
            }
        }
        info!(tag = tag, cancelled = cancelled, "Cancelled jobs by tag");
        cancelled
    }

    /// Handle of the live job for `key`, if any
    pub fn job(&self, key: &ResourceKey) -> Option<JobHandle> {
        self.jobs.lock().get(key).map(|job| job.handle.clone())
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Cancel every live job
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    async fn drive(
        worker: Arc<dyn Worker>,
        config: Arc<SchedulerConfig>,
        jobs: Registry,
        request: FetchRequest,
        id: u64,
        token: CancellationToken,
        status: watch::Sender<JobStatus>,
    ) {
        let key = request.key();
        let mut attempts = 0;

        let final_state = loop {
            if token.is_cancelled() {
                break JobState::Cancelled;
            }

            attempts += 1;
            status.send_replace(JobStatus {
                state: JobState::Running,
                attempts,
            });

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break JobState::Cancelled,
                outcome = worker.run(&request, attempts) => outcome,
            };

            match outcome {
                Outcome::Succeeded => break JobState::Succeeded,
                Outcome::Permanent => break JobState::Permanent,
                Outcome::Retryable => {
                    let delay = config.backoff(attempts);
                    status.send_replace(JobStatus {
                        state: JobState::Pending,
                        attempts,
                    });
                    debug!(key = %key, job = id, attempt = attempts, delay = ?delay, "Retrying after backoff");

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break JobState::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        {
            let mut jobs = jobs.lock();
            // A replacement may already own this key
            if jobs.get(&key).is_some_and(|job| job.id == id) {
                jobs.remove(&key);
            }
        }

        match final_state {
            JobState::Permanent => {
                warn!(key = %key, job = id, attempts = attempts, "Job failed permanently")
            }
            state => info!(key = %key, job = id, attempts = attempts, state = ?state, "Job finished"),
        }

        status.send_replace(JobStatus {
            state: final_state,
            attempts,
        });
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
