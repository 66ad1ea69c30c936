//! Error types for a3s-statebus

use thiserror::Error;

/// Errors that can occur in the event bus
#[derive(Debug, Error)]
pub enum EventError {
    /// Event selector was neither a string nor a sequence of strings
    #[error("Invalid event kind: expected a string or an array of strings, got {0}")]
    InvalidEventKind(String),

    /// Scope was not a string
    #[error("Invalid scope kind: expected a string, got {0}")]
    InvalidScopeKind(String),

    /// Registry or modifier chain is inconsistent with the host listeners
    #[error("Invalid registry state: {0}")]
    InvalidRegistryState(String),

    /// Backing session blob is not a valid serialized state container
    #[error("Stored state under key '{key}' is corrupt: {reason}")]
    StorageCorrupt {
        key: String,
        reason: String,
    },

    /// Session storage read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A state modifier failed during amendment
    #[error("State modifier #{index} failed for event '{event}' in scope '{scope}': {source}")]
    Modifier {
        event: String,
        scope: String,
        index: usize,
        #[source]
        source: CallbackError,
    },

    /// A subscriber action failed during dispatch
    #[error("Action failed for event '{event}': {source}")]
    Action {
        event: String,
        #[source]
        source: CallbackError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal lock poisoned by a panicking callback
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Error type returned by user-supplied callbacks (actions and modifiers)
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for user-supplied callbacks
pub type CallbackResult<T> = std::result::Result<T, CallbackError>;

/// Short human-readable kind of a JSON value, used in kind errors
pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
