//! State amendment: fold per-scope reducers over the current state
//!
//! Modifiers are kept as one insertion-ordered chain, each tagged with the
//! scope it belongs to. Amending a scope runs only that scope's modifiers,
//! in order, each seeing the previous one's output. Nothing is committed
//! unless every modifier succeeds.

use crate::error::{CallbackResult, EventError, Result};
use crate::state::StateStore;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Pure reducer over one scope's state
///
/// Receives `(event_name, current_state, scope, data)` and returns the
/// replacement state. `None` means the scope has no state.
pub trait StateModifier: Send + Sync {
    /// Produce the next state
    fn modify(
        &self,
        event_name: &str,
        state: Option<Value>,
        scope: &str,
        data: &Value,
    ) -> CallbackResult<Option<Value>>;
}

impl<F> StateModifier for F
where
    F: Fn(&str, Option<Value>, &str, &Value) -> CallbackResult<Option<Value>> + Send + Sync,
{
    fn modify(
        &self,
        event_name: &str,
        state: Option<Value>,
        scope: &str,
        data: &Value,
    ) -> CallbackResult<Option<Value>> {
        self(event_name, state, scope, data)
    }
}

/// A modifier together with the scope it runs for
#[derive(Clone)]
pub struct RegisteredModifier {
    /// Scope this modifier belongs to
    pub scope: String,

    /// The reducer
    pub modifier: Arc<dyn StateModifier>,
}

/// Closure form of a modifier, for signature inference
pub trait ModifierFn:
    Fn(&str, Option<Value>, &str, &Value) -> CallbackResult<Option<Value>>
    + Send
    + Sync
    + 'static
{
}

impl<F> ModifierFn for F where
    F: Fn(&str, Option<Value>, &str, &Value) -> CallbackResult<Option<Value>>
        + Send
        + Sync
        + 'static
{
}

impl RegisteredModifier {
    /// Tag a reducer closure with a scope
    pub fn new<F>(modifier: F, scope: impl Into<String>) -> Self
    where
        F: Fn(&str, Option<Value>, &str, &Value) -> CallbackResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self::from_modifier(modifier, scope)
    }

    /// Tag any `StateModifier` implementation with a scope
    pub fn from_modifier(modifier: impl StateModifier + 'static, scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            modifier: Arc::new(modifier),
        }
    }
}

impl fmt::Debug for RegisteredModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredModifier")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Copy-on-write, insertion-ordered modifier chain
#[derive(Default)]
pub struct ModifierChain {
    modifiers: RwLock<Arc<Vec<RegisteredModifier>>>,
}

impl ModifierChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a modifier
    pub fn add(&self, modifier: RegisteredModifier) -> Result<()> {
        let mut guard = self.modifiers.write().map_err(poisoned)?;
        let mut next = Vec::clone(&guard);
        next.push(modifier);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Shared snapshot of the chain
    pub fn snapshot(&self) -> Result<Arc<Vec<RegisteredModifier>>> {
        Ok(self.modifiers.read().map_err(poisoned)?.clone())
    }

    /// Copy of the chain
    pub fn list(&self) -> Result<Vec<RegisteredModifier>> {
        Ok(self.snapshot()?.to_vec())
    }

    /// Replace the whole chain
    pub fn replace(&self, modifiers: Vec<RegisteredModifier>) -> Result<()> {
        *self.modifiers.write().map_err(poisoned)? = Arc::new(modifiers);
        Ok(())
    }

    /// Number of registered modifiers across all scopes
    pub fn len(&self) -> usize {
        self.modifiers.read().map(|m| m.len()).unwrap_or(0)
    }

    /// True when no modifier is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(e: impl fmt::Display) -> EventError {
    EventError::Lock(format!("Modifier chain lock poisoned: {}", e))
}

/// Runs amendments against a store with a modifier chain
#[derive(Clone)]
pub struct Amender {
    store: Arc<StateStore>,
    chain: Arc<ModifierChain>,
}

impl Amender {
    /// Pair a store with a chain
    pub fn new(store: Arc<StateStore>, chain: Arc<ModifierChain>) -> Self {
        Self { store, chain }
    }

    /// The backing state store
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The modifier chain
    pub fn chain(&self) -> &ModifierChain {
        &self.chain
    }

    /// Fold every `scope` modifier over the scope's state and commit
    pub fn amend(&self, event_name: &str, data: &Value, scope: &str) -> Result<()> {
        let modifiers = self.chain.snapshot()?;
        let mut state = self.store.get(scope);
        let mut applied = 0usize;

        for (index, registered) in modifiers.iter().enumerate() {
            if registered.scope != scope {
                continue;
            }
            state = registered
                .modifier
                .modify(event_name, state, scope, data)
                .map_err(|source| EventError::Modifier {
                    event: event_name.to_string(),
                    scope: scope.to_string(),
                    index,
                    source,
                })?;
            applied += 1;
        }

        self.store.set_value(state, scope)?;

        tracing::debug!(
            event = event_name,
            scope = scope,
            modifiers = applied,
            "State amended"
        );
        Ok(())
    }
}
