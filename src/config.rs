//! Bus configuration

use crate::error::{EventError, Result};
use serde::{Deserialize, Serialize};

/// Scope used when a caller does not name one
pub const DEFAULT_SCOPE: &str = "global";

/// Session storage key holding the serialized state container
pub const DEFAULT_STORAGE_KEY: &str = "lcsm";

/// Host signal the startup hook listens for
pub const DEFAULT_READY_SIGNAL: &str = "DOMContentLoaded";

/// Bus event published when the host ready signal fires
pub const DEFAULT_CONTENT_LOADED_EVENT: &str = "DOM_CONTENT_LOADED";

/// How a scope partitions event delivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopingStrategy {
    /// Scope is folded into the dispatch key (`SCOPE_EVENT`); the host only
    /// ever invokes same-scope listeners
    #[default]
    KeyComposition,
    /// Listeners are keyed by the bare event name and drop envelopes whose
    /// `scope` field differs from their own
    PayloadFilter,
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusConfig {
    /// Scope applied when none is given
    pub default_scope: String,

    /// Session storage key for the state container
    pub storage_key: String,

    /// Dispatch key strategy
    pub scoping: ScopingStrategy,

    /// Host signal republished as `content_loaded_event` (None disables the hook)
    pub ready_signal: Option<String>,

    /// Event name published in the default scope when the host is ready
    pub content_loaded_event: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_scope: DEFAULT_SCOPE.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            scoping: ScopingStrategy::default(),
            ready_signal: Some(DEFAULT_READY_SIGNAL.to_string()),
            content_loaded_event: DEFAULT_CONTENT_LOADED_EVENT.to_string(),
        }
    }
}

impl BusConfig {
    /// Parse a configuration from JSON, filling omitted fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Use a different dispatch key strategy
    pub fn with_scoping(mut self, scoping: ScopingStrategy) -> Self {
        self.scoping = scoping;
        self
    }

    /// Disable the startup hook
    pub fn without_ready_signal(mut self) -> Self {
        self.ready_signal = None;
        self
    }

    /// Check that every required name is non-empty
    pub fn validate(&self) -> Result<()> {
        if self.default_scope.is_empty() {
            return Err(EventError::Config("Default scope cannot be empty".to_string()));
        }
        if self.storage_key.is_empty() {
            return Err(EventError::Config("Storage key cannot be empty".to_string()));
        }
        if self.content_loaded_event.is_empty() {
            return Err(EventError::Config(
                "Content loaded event cannot be empty".to_string(),
            ));
        }
        if matches!(self.ready_signal.as_deref(), Some("")) {
            return Err(EventError::Config(
                "Ready signal cannot be empty (use null to disable it)".to_string(),
            ));
        }
        Ok(())
    }
}
