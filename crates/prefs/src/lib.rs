//! DroidKit Prefs - Typed persisted values
//!
//! Typed accessors over keyed stores, with change notifications delivered
//! through the core observer registry. Applications reach both accessors
//! through an explicit [`PrefsContext`] rather than a global instance.

pub mod context;
pub mod preferences;
pub mod store;
pub mod value;

pub use context::{PrefsContext, StoreKind};
pub use preferences::{PreferenceChange, PreferenceObserver, Preferences};
pub use store::{FileStore, MemoryStore, PreferenceStore, StoreFormat};
pub use value::PrefValue;
