//! Metadata resolver contract

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, SessionError};
use crate::types::{AudioId, AudioMetadata};

/// Turns bare ids into queue entries
///
/// Ids that cannot be resolved are skipped; the returned entries keep the
/// order of the request.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, ids: &[AudioId]) -> Result<Vec<AudioMetadata>>;
}

/// Resolver over an in-memory catalog
///
/// Backs the terminal host and tests; real hosts resolve against storage.
#[derive(Debug, Default)]
pub struct CatalogResolver {
    entries: RwLock<HashMap<AudioId, AudioMetadata>>,
}

impl CatalogResolver {
    pub fn new(entries: impl IntoIterator<Item = AudioMetadata>) -> Self {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|audio| (audio.id.clone(), audio))
                    .collect(),
            ),
        }
    }

    /// Add or replace a catalog entry
    pub fn insert(&self, audio: AudioMetadata) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SessionError::Resolve(e.to_string()))?;
        entries.insert(audio.id.clone(), audio);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataResolver for CatalogResolver {
    async fn resolve(&self, ids: &[AudioId]) -> Result<Vec<AudioMetadata>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SessionError::Resolve(e.to_string()))?;
        Ok(ids.iter().filter_map(|id| entries.get(id).cloned()).collect())
    }
}
