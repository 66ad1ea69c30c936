//! Scope naming — maps `(event, scope)` pairs to dispatch keys
//!
//! Every path that talks to the host event primitive (subscribe, publish,
//! unsubscribe) resolves its key here, so a publisher and a subscriber that
//! name the same pair always meet on the same key.

use crate::config::ScopingStrategy;
use crate::error::{value_kind, EventError, Result};
use serde_json::Value;

/// Combine a scope and an event name into a scope-qualified key
///
/// The scope is upper-cased, the event name is kept as-is:
/// `canonical_key("SAVE", "editor") == "EDITOR_SAVE"`.
pub fn canonical_key(event_name: &str, scope: &str) -> String {
    format!("{}_{}", scope.to_uppercase(), event_name)
}

/// Extract a scope from a dynamically typed value
///
/// `null` resolves to `default_scope`; anything other than a string fails
/// with `InvalidScopeKind`.
pub fn scope_from_value(value: &Value, default_scope: &str) -> Result<String> {
    match value {
        Value::Null => Ok(default_scope.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(EventError::InvalidScopeKind(value_kind(other).to_string())),
    }
}

/// Resolves dispatch keys for one bus
#[derive(Debug, Clone)]
pub struct ScopeNamer {
    strategy: ScopingStrategy,
    default_scope: String,
}

impl ScopeNamer {
    /// Create a namer for a strategy and default scope
    pub fn new(strategy: ScopingStrategy, default_scope: impl Into<String>) -> Self {
        Self {
            strategy,
            default_scope: default_scope.into(),
        }
    }

    /// The scope used when none is given
    pub fn default_scope(&self) -> &str {
        &self.default_scope
    }

    /// The active strategy
    pub fn strategy(&self) -> ScopingStrategy {
        self.strategy
    }

    /// Resolve an optional scope to a concrete one
    pub fn resolve_scope<'a>(&'a self, scope: Option<&'a str>) -> &'a str {
        scope.unwrap_or(&self.default_scope)
    }

    /// Key a listener is registered under and a publish is raised on
    ///
    /// Under `PayloadFilter` this is the bare event name.
    pub fn dispatch_key(&self, event_name: &str, scope: Option<&str>) -> String {
        match self.strategy {
            ScopingStrategy::KeyComposition => {
                canonical_key(event_name, self.resolve_scope(scope))
            }
            ScopingStrategy::PayloadFilter => event_name.to_string(),
        }
    }
}
