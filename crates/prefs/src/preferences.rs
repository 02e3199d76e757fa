//! Typed Accessor
//!
//! [`Preferences`] wraps a [`PreferenceStore`] with typed getters and
//! setters and notifies registered [`PreferenceObserver`]s of every change.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use droidkit_core::error::{DroidKitError, Result};
use droidkit_core::observer::{ObserverId, ObserverRegistry, Subsystem};

use crate::store::PreferenceStore;
use crate::value::PrefValue;

/// Notification payload for a changed key
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceChange {
    pub key: String,
    /// Value after the change, `None` when the key was removed
    pub value: Option<PrefValue>,
}

/// Receives preference changes
pub trait PreferenceObserver: Send + Sync {
    fn on_preference_changed(&self, change: &PreferenceChange) -> Result<()>;
}

impl<F> PreferenceObserver for F
where
    F: Fn(&PreferenceChange) -> Result<()> + Send + Sync,
{
    fn on_preference_changed(&self, change: &PreferenceChange) -> Result<()> {
        self(change)
    }
}

/// Change event category for one store. The payload is read from the store
/// when the round runs, so observers always see the current value.
pub struct PreferenceSubsystem<S> {
    label: &'static str,
    store: Arc<S>,
}

impl<S: PreferenceStore> Subsystem for PreferenceSubsystem<S> {
    type Raw = String;
    type Payload = PreferenceChange;
    type Observer = dyn PreferenceObserver;

    fn name(&self) -> &str {
        self.label
    }

    fn derive(&self, key: &String) -> Result<PreferenceChange> {
        Ok(PreferenceChange {
            key: key.clone(),
            value: self.store.get(key),
        })
    }

    fn deliver(&self, observer: &dyn PreferenceObserver, payload: &PreferenceChange) -> Result<()> {
        observer.on_preference_changed(payload)
    }
}

/// Typed access to a store
pub struct Preferences<S: PreferenceStore> {
    store: Arc<S>,
    observers: ObserverRegistry<PreferenceSubsystem<S>>,
}

impl<S: PreferenceStore> Preferences<S> {
    /// Wrap `store`; `label` names this accessor in log output
    pub fn new(label: &'static str, store: S) -> Self {
        let store = Arc::new(store);
        Self {
            observers: ObserverRegistry::new(PreferenceSubsystem {
                label,
                store: Arc::clone(&store),
            }),
            store,
        }
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn label(&self) -> &str {
        self.observers.subsystem().name()
    }

    pub fn register(&self, observer: Arc<dyn PreferenceObserver>) -> Option<ObserverId> {
        self.observers.register(observer)
    }

    pub fn unregister(&self, observer: &Arc<dyn PreferenceObserver>) -> bool {
        self.observers.unregister(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.count()
    }

    pub fn get(&self, key: &str) -> Option<PrefValue> {
        self.store.get(key)
    }

    /// Like [`Preferences::get`], but a missing key is an error
    pub fn require(&self, key: &str) -> Result<PrefValue> {
        self.store
            .get(key)
            .ok_or_else(|| DroidKitError::NotFound(key.to_string()))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.typed(key, PrefValue::as_bool).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.typed(key, PrefValue::as_int).unwrap_or(default)
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.typed(key, PrefValue::as_float).unwrap_or(default)
    }

    pub fn get_text(&self, key: &str, default: &str) -> String {
        self.typed(key, |v| v.as_text().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_text_set(&self, key: &str) -> BTreeSet<String> {
        self.typed(key, |v| v.as_text_set().cloned())
            .unwrap_or_default()
    }

    /// Read `key` through `extract`; a value of another type reads as absent
    fn typed<T>(&self, key: &str, extract: impl FnOnce(&PrefValue) -> Option<T>) -> Option<T> {
        let value = self.store.get(key)?;
        let typed = extract(&value);
        if typed.is_none() {
            debug!("{}: '{}' holds a {}, using default", self.label(), key, value.type_name());
        }
        typed
    }

    /// Store a value, notifying observers if it changed
    pub fn put(&self, key: &str, value: impl Into<PrefValue>) -> Result<()> {
        if key.trim().is_empty() {
            return Err(DroidKitError::InvalidValue("key must not be empty".into()));
        }

        let value = value.into();
        value.validate()?;
        let previous = self.store.put(key, value.clone());
        if previous.as_ref() != Some(&value) {
            self.notify(key);
        }
        Ok(())
    }

    pub fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, value)
    }

    pub fn put_int(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, value)
    }

    pub fn put_float(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, value)
    }

    pub fn put_text(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, value)
    }

    pub fn put_text_set<I, T>(&self, key: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        self.put(key, set)
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.store.remove(key).is_some();
        if removed {
            self.notify(key);
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Remove every key, notifying once per removed key
    pub fn clear(&self) -> usize {
        let removed = self.store.clear();
        for key in &removed {
            self.notify(key);
        }
        removed.len()
    }

    /// Failed deliveries are logged by the registry and do not fail the
    /// mutation that triggered them
    fn notify(&self, key: &str) {
        if let Err(e) = self.observers.dispatch(&key.to_string()) {
            // Changes made from inside an observer callback land here
            debug!("{}: change notification for '{}' dropped: {}", self.label(), key, e);
        }
    }
}
