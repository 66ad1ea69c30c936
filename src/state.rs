//! Scoped state persistence
//!
//! All scopes live in one JSON object stored under a single session
//! storage key. Every write serializes the whole container in one call,
//! and every read deserializes a fresh copy, so values handed out are
//! snapshots that later writes never touch.

use crate::error::{EventError, Result};
use crate::provider::SessionStorage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// Scope name → state container
pub type StateContainer = Map<String, Value>;

/// Session-backed store for per-scope state
pub struct StateStore {
    storage: Arc<dyn SessionStorage>,
    key: String,
    /// Serialises read-modify-write cycles across threads
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Create a store persisting under `key`
    pub fn new(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage key holding the container
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the container, reporting a corrupt blob
    ///
    /// A missing blob is an empty container. A blob that is not a JSON
    /// object fails with `StorageCorrupt`.
    pub fn load(&self) -> Result<StateContainer> {
        let Some(blob) = self.storage.read(&self.key)? else {
            return Ok(Map::new());
        };

        match serde_json::from_str::<Value>(&blob) {
            Ok(Value::Object(container)) => Ok(container),
            Ok(other) => Err(EventError::StorageCorrupt {
                key: self.key.clone(),
                reason: format!("expected an object, found {}", crate::error::value_kind(&other)),
            }),
            Err(e) => Err(EventError::StorageCorrupt {
                key: self.key.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Snapshot of every scope; a corrupt or unreadable blob reads as empty
    pub fn all(&self) -> StateContainer {
        match self.load() {
            Ok(container) => container,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Treating stored state as empty");
                Map::new()
            }
        }
    }

    /// Current state of `scope`, or `None` if it was never set
    pub fn get(&self, scope: &str) -> Option<Value> {
        self.all().remove(scope)
    }

    /// Current state of `scope` deserialized into `T`
    pub fn get_as<T: DeserializeOwned>(&self, scope: &str) -> Result<Option<T>> {
        self.get(scope)
            .map(serde_json::from_value)
            .transpose()
            .map_err(EventError::from)
    }

    /// Replace the state of `scope` with any serializable value
    ///
    /// The value goes through one JSON round-trip: skipped fields vanish
    /// and non-finite numbers become `null`.
    pub fn set<T: Serialize + ?Sized>(&self, value: &T, scope: &str) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(Some(value), scope)
    }

    /// Replace the state of `scope`; `None` removes the scope entry
    ///
    /// A corrupt blob is replaced. Any other read failure is returned and
    /// nothing is written, so other scopes are never lost.
    pub fn set_value(&self, value: Option<Value>, scope: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| EventError::Lock(format!("State store lock poisoned: {}", e)))?;

        let mut container = match self.load() {
            Ok(container) => container,
            Err(e @ EventError::StorageCorrupt { .. }) => {
                tracing::warn!(key = %self.key, error = %e, "Replacing corrupt stored state");
                Map::new()
            }
            Err(e) => return Err(e),
        };
        match value {
            Some(value) => {
                container.insert(scope.to_string(), value);
            }
            None => {
                container.remove(scope);
            }
        }
        self.commit(&container)?;

        tracing::debug!(key = %self.key, scope = scope, "State committed");
        Ok(())
    }

    /// Replace every scope with an empty container
    pub fn reset_all(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| EventError::Lock(format!("State store lock poisoned: {}", e)))?;
        self.commit(&Map::new())?;
        tracing::debug!(key = %self.key, "State reset");
        Ok(())
    }

    fn commit(&self, container: &StateContainer) -> Result<()> {
        let blob = serde_json::to_string(container)?;
        self.storage.write(&self.key, blob)
    }
}
