//! Persisted Value Context
//!
//! Owns the two accessors an application uses: `preferences` (TOML file)
//! and `keeper` (JSON file). The application shell creates the context,
//! hands references to whatever needs persisted values, and commits it
//! before exiting.

use tracing::info;

use droidkit_core::config::PrefsConfig;
use droidkit_core::error::Result;

use crate::preferences::Preferences;
use crate::store::{FileStore, MemoryStore, PreferenceStore, StoreFormat};

/// Which accessor of a context to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Preferences,
    Keeper,
}

impl StoreKind {
    pub fn label(&self) -> &'static str {
        match self {
            StoreKind::Preferences => "preferences",
            StoreKind::Keeper => "keeper",
        }
    }
}

/// Accessors for persisted values
pub struct PrefsContext<P: PreferenceStore = FileStore, K: PreferenceStore = FileStore> {
    preferences: Preferences<P>,
    keeper: Preferences<K>,
}

impl<P: PreferenceStore, K: PreferenceStore> PrefsContext<P, K> {
    /// Build a context from existing stores
    pub fn from_stores(preferences: P, keeper: K) -> Self {
        Self {
            preferences: Preferences::new(StoreKind::Preferences.label(), preferences),
            keeper: Preferences::new(StoreKind::Keeper.label(), keeper),
        }
    }

    pub fn preferences(&self) -> &Preferences<P> {
        &self.preferences
    }

    pub fn keeper(&self) -> &Preferences<K> {
        &self.keeper
    }
}

impl PrefsContext<FileStore, FileStore> {
    /// Open both stores at the locations in `config`
    pub async fn open(config: &PrefsConfig) -> Result<Self> {
        let preferences = FileStore::open(&config.preferences_file, StoreFormat::Toml).await?;
        let keeper = FileStore::open(&config.keeper_file, StoreFormat::Json).await?;
        info!(
            "Opened preferences ({} values) and keeper ({} values)",
            preferences.len(),
            keeper.len()
        );
        Ok(Self::from_stores(preferences, keeper))
    }

    /// The accessor for `kind`. Both stores share a type here, so callers
    /// can pick one at runtime.
    pub fn accessor(&self, kind: StoreKind) -> &Preferences<FileStore> {
        match kind {
            StoreKind::Preferences => &self.preferences,
            StoreKind::Keeper => &self.keeper,
        }
    }

    /// Write pending changes of both stores. Returns how many files were written.
    pub async fn commit(&self) -> Result<usize> {
        let mut written = 0;
        for store in [self.preferences.store(), self.keeper.store()] {
            if store.commit().await? {
                written += 1;
            }
        }
        Ok(written)
    }
}

impl PrefsContext<MemoryStore, MemoryStore> {
    /// Context that persists nothing
    pub fn in_memory() -> Self {
        Self::from_stores(MemoryStore::new(), MemoryStore::new())
    }
}
