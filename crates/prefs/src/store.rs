//! Value Stores
//!
//! Backing storage for typed accessors. Stores are keyed maps with interior
//! mutability; [`FileStore`] additionally loads from and commits to a file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use droidkit_core::error::{DroidKitError, Result};

use crate::value::PrefValue;

/// Keyed storage behind an accessor
pub trait PreferenceStore: Send + Sync {
    /// Current value for `key`
    fn get(&self, key: &str) -> Option<PrefValue>;

    /// Store `value`, returning the previous value
    fn put(&self, key: &str, value: PrefValue) -> Option<PrefValue>;

    /// Remove `key`, returning the previous value
    fn remove(&self, key: &str) -> Option<PrefValue>;

    /// All keys in sorted order
    fn keys(&self) -> Vec<String>;

    /// Remove everything, returning the removed keys
    fn clear(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, PrefValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: PrefValue) -> Option<PrefValue> {
        self.values.write().insert(key.to_string(), value)
    }

    fn remove(&self, key: &str) -> Option<PrefValue> {
        self.values.write().remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    fn clear(&self) -> Vec<String> {
        let removed = std::mem::take(&mut *self.values.write());
        removed.into_keys().collect()
    }

    fn len(&self) -> usize {
        self.values.read().len()
    }
}

/// On-disk encoding of a [`FileStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Toml,
    Json,
}

impl StoreFormat {
    /// Pick a format from the file extension, defaulting to TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => StoreFormat::Json,
            _ => StoreFormat::Toml,
        }
    }

    fn encode(&self, values: &BTreeMap<String, PrefValue>) -> Result<String> {
        Ok(match self {
            StoreFormat::Toml => toml::to_string_pretty(values)?,
            StoreFormat::Json => serde_json::to_string_pretty(values)?,
        })
    }

    fn decode(&self, contents: &str) -> Result<BTreeMap<String, PrefValue>> {
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(match self {
            StoreFormat::Toml => toml::from_str(contents)?,
            StoreFormat::Json => serde_json::from_str(contents)?,
        })
    }
}

/// Store persisted to a single file.
///
/// Mutations stay in memory until [`FileStore::commit`] writes them out.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    format: StoreFormat,
    values: RwLock<BTreeMap<String, PrefValue>>,
    dirty: AtomicBool,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl Into<PathBuf>, format: StoreFormat) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let contents = tokio::fs::read_to_string(&path).await?;
            let values = format.decode(&contents).map_err(|e| {
                DroidKitError::Store(format!("cannot read {}: {}", path.display(), e))
            })?;
            debug!("Loaded {} values from {:?}", values.len(), path);
            values
        } else {
            debug!("Store file {:?} not found, starting empty", path);
            BTreeMap::new()
        };

        Ok(Self {
            path,
            format,
            values: RwLock::new(values),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StoreFormat {
        self.format
    }

    /// True when there are uncommitted changes
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write pending changes to disk. Returns whether the file was written.
    pub async fn commit(&self) -> Result<bool> {
        if !self.is_dirty() && self.path.exists() {
            return Ok(false);
        }

        // Cleared under the read lock so a concurrent put re-marks it afterwards
        let contents = {
            let values = self.values.read();
            let contents = self.format.encode(&values)?;
            self.dirty.store(false, Ordering::Release);
            contents
        };

        if let Err(e) = self.write_file(contents).await {
            self.mark_dirty();
            return Err(e);
        }

        info!("Committed {} values to {:?}", self.len(), self.path);
        Ok(true)
    }

    async fn write_file(&self, contents: String) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: PrefValue) -> Option<PrefValue> {
        let previous = self.values.write().insert(key.to_string(), value);
        self.mark_dirty();
        previous
    }

    fn remove(&self, key: &str) -> Option<PrefValue> {
        let previous = self.values.write().remove(key);
        if previous.is_some() {
            self.mark_dirty();
        }
        previous
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    fn clear(&self) -> Vec<String> {
        let removed = std::mem::take(&mut *self.values.write());
        if !removed.is_empty() {
            self.mark_dirty();
        }
        removed.into_keys().collect()
    }

    fn len(&self) -> usize {
        self.values.read().len()
    }
}
