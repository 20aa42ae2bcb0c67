//! Host key/value stores and the typed position store over them.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::record::{BookIdentity, PositionRecord};
use crate::errors::ReaderError;

/// Host-provided key/value persistence.
///
/// Writes are last-write-wins per key.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Gets a stored value.
    async fn get(&self, key: &str) -> Result<Option<Value>, ReaderError>;

    /// Stores a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<(), ReaderError>;
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: DashMap<String, Value>,
}

impl MemorySettingsStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads a value synchronously.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| v.clone())
    }

    /// Writes a value synchronously.
    pub fn insert_raw(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, ReaderError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), ReaderError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings store backed by one JSON object in a file.
///
/// The whole map is rewritten through a temporary file and renamed into
/// place on every `set`.
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl JsonFileSettingsStore {
    /// Opens a store, reading the file if it exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => HashMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened settings file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, ReaderError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), ReaderError> {
        let serialized = {
            let mut entries = self.entries.lock();
            entries.insert(key.to_string(), value);
            serde_json::to_vec_pretty(&*entries)?
        };

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Typed access to position records keyed by book identity.
#[derive(Clone)]
pub struct PositionStore {
    store: Arc<dyn SettingsStore>,
}

impl PositionStore {
    /// Creates a position store over a host settings store.
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Loads the record for a book.
    ///
    /// Corrupt records fall back to the start of a local book with a
    /// warning. An unknown kind tag is reported as
    /// [`ReaderError::UnsupportedBookKind`].
    pub async fn load(&self, identity: &BookIdentity) -> Result<Option<PositionRecord>, ReaderError> {
        let Some(value) = self.store.get(identity.as_str()).await? else {
            return Ok(None);
        };

        match PositionRecord::decode(identity, &value) {
            Ok(record) => Ok(Some(record)),
            Err(ReaderError::InvalidPersistedState { identity: key, reason }) => {
                warn!(identity = %key, reason = %reason, "Discarding unreadable position record");
                Ok(Some(PositionRecord::default()))
            }
            Err(e) => Err(e),
        }
    }

    /// Persists the record for a book.
    pub async fn save(&self, identity: &BookIdentity, record: &PositionRecord) -> Result<(), ReaderError> {
        debug!(identity = %identity, kind = record.kind(), offset = record.consumed_offset(), "Saving position");
        self.store.set(identity.as_str(), record.encode()?).await
    }
}

impl std::fmt::Debug for PositionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStore").finish_non_exhaustive()
    }
}
