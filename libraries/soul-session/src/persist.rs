//! Session State Persister
//!
//! Serializes the queue ids, provenance, current position and mode flags so
//! a cold start can pick up where the last process left off. Restore is best
//! effort: a missing, unreadable or corrupt record means "no saved session",
//! never a startup failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::queue::QueueStore;
use crate::source::QueueSource;
use crate::types::{AudioId, RepeatMode, ShuffleMode};

/// Durable storage for one serialized session
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, data: &str) -> Result<()>;

    async fn load(&self) -> Result<Option<String>>;
}

/// Persisted session record
///
/// Every field has a default so older or partial records still decode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedSession {
    pub ids: Vec<AudioId>,
    pub source: QueueSource,
    pub title: Option<String>,
    pub current_index: usize,
    pub current_id: Option<AudioId>,
    pub shuffle: ShuffleMode,
    pub repeat: RepeatMode,
    pub position_ms: u64,
    pub saved_at: Option<DateTime<Utc>>,
}

impl SavedSession {
    /// Capture the persistable part of a queue
    pub fn capture(store: &QueueStore, position: Duration) -> Self {
        let mode = store.mode();
        Self {
            ids: store.ids(),
            source: store.source().clone(),
            title: store.title().map(str::to_string),
            current_index: store.current_index(),
            current_id: store.get(store.current_index()).map(|a| a.id.clone()),
            shuffle: mode.shuffle,
            repeat: mode.repeat,
            position_ms: position.as_millis() as u64,
            saved_at: Some(Utc::now()),
        }
    }

    /// Index to resume at within `ids`
    ///
    /// Prefers the saved current id, which survives list edits, and falls back
    /// to the saved index clamped into range.
    pub fn resume_index(&self, ids: &[AudioId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        self.current_id
            .as_ref()
            .and_then(|id| ids.iter().position(|candidate| candidate == id))
            .unwrap_or_else(|| self.current_index.min(ids.len() - 1))
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms)
    }

    /// Decode a stored record; `None` for corrupt or empty sessions
    pub fn decode(data: &str) -> Option<Self> {
        match serde_json::from_str::<SavedSession>(data) {
            Ok(session) if session.ids.is_empty() => None,
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Discarding corrupt saved session: {}", e);
                None
            }
        }
    }
}

/// Reads and writes [`SavedSession`] records through a [`SessionStore`]
#[derive(Clone)]
pub struct SessionPersister {
    store: Arc<dyn SessionStore>,
}

impl SessionPersister {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, session: &SavedSession) -> Result<()> {
        let data = serde_json::to_string(session)?;
        self.store.save(&data).await?;
        debug!(
            "Saved session: {} entries, index {}",
            session.ids.len(),
            session.current_index
        );
        Ok(())
    }

    /// Load the last session, if any survives decoding
    pub async fn restore(&self) -> Option<SavedSession> {
        match self.store.load().await {
            Ok(Some(data)) => SavedSession::decode(&data),
            Ok(None) => None,
            Err(e) => {
                warn!("Saved session unavailable: {}", e);
                None
            }
        }
    }
}

/// JSON file session store
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, data: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    data: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(data: impl Into<String>) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
        }
    }

    /// Last saved record
    pub fn contents(&self) -> Option<String> {
        self.data.lock().ok().and_then(|data| data.clone())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, data: &str) -> Result<()> {
        let mut slot = self
            .data
            .lock()
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        *slot = Some(data.to_string());
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>> {
        let slot = self
            .data
            .lock()
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        Ok(slot.clone())
    }
}
