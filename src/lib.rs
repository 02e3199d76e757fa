//! DroidKit - platform utility building blocks
//!
//! A typed observer registry with snapshot dispatch, and the pieces built
//! on top of it.
//!
//! ## Features
//!
//! - **Observer registry**: ordered, re-entrant-safe listener lists with one
//!   derived payload per dispatch round
//! - **Connectivity notifications**: raw link events turned into network
//!   status updates
//! - **Persisted values**: typed preferences and keeper accessors over TOML
//!   and JSON files, with change notifications
//!
//! ## Architecture
//!
//! DroidKit is organized into specialized crates:
//!
//! - `droidkit-core`: observer registry, connectivity, configuration, errors
//! - `droidkit-prefs`: value stores, typed accessors and the context object

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use droidkit_core as core;
pub use droidkit_prefs as prefs;

/// Prelude module for convenient imports
pub mod prelude {
    pub use droidkit_core::config::AppConfig;
    pub use droidkit_core::error::{DroidKitError, Result};
    pub use droidkit_core::network::{NetworkObserver, NetworkRegistry, NetworkStatus};
    pub use droidkit_core::observer::{ObserverRegistry, Subsystem};
    pub use droidkit_prefs::{PreferenceObserver, Preferences, PrefsContext};
}
