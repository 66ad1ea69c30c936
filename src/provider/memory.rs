//! In-memory host primitives for single-process use and testing

use super::{EventTarget, Listener, SessionStorage};
use crate::error::{EventError, Result};
use crate::types::{Envelope, ListenerId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// In-memory event target
///
/// Listeners are kept per key in registration order. `raise` snapshots the
/// listener list before invoking anything, so listeners added or removed
/// during a dispatch take effect from the next raise.
pub struct MemoryEventTarget {
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl MemoryEventTarget {
    /// Create an empty target
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of listeners registered under `key`
    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners
            .read()
            .map(|l| l.get(key).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Number of listeners across all keys
    pub fn total_listeners(&self) -> usize {
        self.listeners
            .read()
            .map(|l| l.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl Default for MemoryEventTarget {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(e: impl std::fmt::Display) -> EventError {
    EventError::Lock(format!("Event target lock poisoned: {}", e))
}

impl EventTarget for MemoryEventTarget {
    fn add_listener(&self, key: &str, listener: Listener) -> Result<ListenerId> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().map_err(poisoned)?;
        listeners
            .entry(key.to_string())
            .or_default()
            .push((id, listener));
        Ok(id)
    }

    fn remove_listener(&self, key: &str, id: ListenerId) -> Result<bool> {
        let mut listeners = self.listeners.write().map_err(poisoned)?;
        let Some(entries) = listeners.get_mut(key) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(key);
        }
        Ok(removed)
    }

    fn has_listener(&self, key: &str, id: ListenerId) -> Result<bool> {
        let listeners = self.listeners.read().map_err(poisoned)?;
        Ok(listeners
            .get(key)
            .is_some_and(|entries| entries.iter().any(|(existing, _)| *existing == id)))
    }

    fn raise(&self, key: &str, envelope: &Envelope) -> Result<()> {
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.read().map_err(poisoned)?;
            match listeners.get(key) {
                Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
                None => return Ok(()),
            }
        };

        for listener in snapshot {
            listener(key, envelope)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// In-memory session storage
///
/// Lives as long as the value does, which is the session for a
/// process-wide bus.
#[derive(Default)]
pub struct MemorySessionStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|e| {
            EventError::Lock(format!("Session storage lock poisoned: {}", e))
        })?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.write().map_err(|e| {
            EventError::Lock(format!("Session storage lock poisoned: {}", e))
        })?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
