//! Saved camp records and the stores that keep them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::entity::EntityId;
use crate::error::{Error, Result};

/// Everything that must survive a restart for one camp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    /// Owned interior and perimeter objects, in creation order, no duplicates
    #[serde(default)]
    pub sub_objects: Vec<EntityId>,
    pub removal_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LifecycleRecord {
    pub fn new(created_at: DateTime<Utc>, removal_deadline: DateTime<Utc>) -> Self {
        Self {
            sub_objects: Vec::new(),
            removal_deadline,
            created_at,
        }
    }

    /// Add `id` unless already present
    pub fn add_sub_object(&mut self, id: EntityId) -> bool {
        if self.sub_objects.contains(&id) {
            return false;
        }
        self.sub_objects.push(id);
        true
    }
}

/// Persisted document: structure id to record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredData {
    #[serde(default)]
    pub structures: BTreeMap<EntityId, LifecycleRecord>,
}

/// Key/document storage.
///
/// `load` never fails: a missing or unreadable document is the empty default.
pub trait Persistence: Send + Sync {
    fn load(&self, key: &str) -> StoredData;

    fn save(&self, key: &str, data: &StoredData) -> Result<()>;
}

/// One pretty-printed JSON file per key
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn write(&self, key: &str, data: &StoredData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path(key)).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl Persistence for JsonFileStore {
    fn load(&self, key: &str) -> StoredData {
        let path = self.path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return StoredData::default(),
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                return StoredData::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                warn!("Corrupt data file {}, starting empty: {}", path.display(), e);
                StoredData::default()
            }
        }
    }

    fn save(&self, key: &str, data: &StoredData) -> Result<()> {
        self.write(key, data)
            .map_err(|source| Error::PersistenceWriteFailed {
                key: key.to_string(),
                source: Box::new(source),
            })
    }
}

/// In-process store holding serialized documents
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Replace the stored document for `key` directly
    pub fn seed(&self, key: &str, data: &StoredData) -> Result<()> {
        let json = serde_json::to_string(data)?;
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), json);
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn load(&self, key: &str) -> StoredData {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.get(key)
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }

    fn save(&self, key: &str, data: &StoredData) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::PersistenceWriteFailed {
                key: key.to_string(),
                source: Box::new(Error::Io(std::io::Error::other("store offline"))),
            });
        }
        self.seed(key, data)
    }
}
