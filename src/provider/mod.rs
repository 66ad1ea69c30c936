//! Host primitives: the raw event target and the session key-value store
//!
//! The bus never fans events out or persists bytes itself. It consumes an
//! `EventTarget` for listener registration and dispatch, and a
//! `SessionStorage` for the serialized state blob. Hosts plug in their own
//! implementations; `memory` provides in-process ones.

use crate::error::Result;
use crate::types::{Envelope, ListenerId};
use std::sync::Arc;

pub mod memory;

/// Raw listener installed on an `EventTarget`: `(key, envelope)`
pub type Listener = Arc<dyn Fn(&str, &Envelope) -> Result<()> + Send + Sync>;

/// Synchronous in-process event primitive
///
/// Implementations must invoke listeners for a key in registration order,
/// support any number of listeners per key, and must not hold internal
/// locks while a listener runs (listeners may re-enter the target).
pub trait EventTarget: Send + Sync {
    /// Register a listener under `key`, returning its handle
    fn add_listener(&self, key: &str, listener: Listener) -> Result<ListenerId>;

    /// Deregister a listener; returns false if it was not registered
    fn remove_listener(&self, key: &str, id: ListenerId) -> Result<bool>;

    /// Whether `id` is currently registered under `key`
    fn has_listener(&self, key: &str, id: ListenerId) -> Result<bool>;

    /// Synchronously invoke every listener registered under `key`
    ///
    /// Stops at, and returns, the first listener error.
    fn raise(&self, key: &str, envelope: &Envelope) -> Result<()>;

    /// Target name (e.g., "memory")
    fn name(&self) -> &str;
}

/// Session-lifetime string key-value store
pub trait SessionStorage: Send + Sync {
    /// Read the value under `key`, if any
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`
    fn write(&self, key: &str, value: String) -> Result<()>;

    /// Storage name (e.g., "memory")
    fn name(&self) -> &str;
}
