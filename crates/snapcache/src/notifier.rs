//! # Consumer State
//!
//! Where fetched images are published. [`StateNotifier`] is the write side
//! used by the fetch task; [`WidgetStateStore`] is a JSON-file backed
//! implementation that also lets consumers subscribe to refresh events.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::error::NotifyError;
use crate::request::ResourceKey;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What a consumer needs to draw one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub image_path: String,
    pub source: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// State for this key changed
    Updated(String),
    /// Every consumer should redraw
    All,
}

#[async_trait]
pub trait StateNotifier: Send + Sync {
    async fn write_state(&self, key: &ResourceKey, state: WidgetState) -> Result<(), NotifyError>;

    async fn refresh_all(&self) -> Result<(), NotifyError>;
}

pub struct WidgetStateStore {
    states: RwLock<BTreeMap<String, WidgetState>>,
    path: Option<PathBuf>,
    events: broadcast::Sender<RefreshEvent>,
    // Serializes read-modify-persist so the file never goes backwards
    persist_lock: Mutex<()>,
}

impl WidgetStateStore {
    fn with_states(states: BTreeMap<String, WidgetState>, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            states: RwLock::new(states),
            path,
            events,
            persist_lock: Mutex::new(()),
        }
    }

    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::with_states(BTreeMap::new(), None)
    }

    /// Load the store from `path`, starting empty if the file does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, NotifyError> {
        let path = path.into();
        let states = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = ?path, entries = states.len(), "Opened widget state store");
        Ok(Self::with_states(states, Some(path)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, key: &str) -> Option<WidgetState> {
        self.states.read().get(key).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, WidgetState> {
        self.states.read().clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write `states` to disk. Callers hold `persist_lock`.
    async fn persist(&self, states: &BTreeMap<String, WidgetState>) -> Result<(), NotifyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(states)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        fs::write(&temp, &json).await?;
        fs::rename(&temp, path).await?;
        Ok(())
    }

    fn publish(&self, event: RefreshEvent) {
        // No subscribers is fine
        let receivers = self.events.send(event).unwrap_or(0);
        debug!(receivers = receivers, "Published refresh event");
    }
}

#[async_trait]
impl StateNotifier for WidgetStateStore {
    async fn write_state(&self, key: &ResourceKey, state: WidgetState) -> Result<(), NotifyError> {
        let key = key.to_string();
        let guard = self.persist_lock.lock().await;

        let mut next = self.states.read().clone();
        next.insert(key.clone(), state);
        // Readers only see the new entry once it is on disk
        self.persist(&next).await?;
        *self.states.write() = next;
        drop(guard);

        self.publish(RefreshEvent::Updated(key));
        Ok(())
    }

    async fn refresh_all(&self) -> Result<(), NotifyError> {
        self.publish(RefreshEvent::All);
        Ok(())
    }
}
