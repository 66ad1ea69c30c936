//! Core bus types
//!
//! Serializable types use camelCase JSON for compatibility with the
//! persisted state layout and host payloads.

use crate::error::{value_kind, CallbackResult, EventError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque handle for a listener registered on the host event primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Payload carried by every raised event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Host-side event that triggered the publish (null when synthetic)
    #[serde(default)]
    pub dom_event: Value,

    /// Scope the event was published in
    pub scope: String,

    /// Data handed to state modifiers
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Create an envelope
    pub fn new(dom_event: Value, scope: impl Into<String>, data: Value) -> Self {
        Self {
            dom_event,
            scope: scope.into(),
            data,
        }
    }
}

/// The raised event as seen by a subscriber action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEvent {
    /// Dispatch key the event was raised under
    pub key: String,

    /// Envelope the publisher attached
    pub detail: Envelope,
}

/// Subscriber callback: `(source_event, dom_event)`
pub type Action = Arc<dyn Fn(&SourceEvent, &Value) -> CallbackResult<()> + Send + Sync>;

/// One or more event names to subscribe to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSelector {
    /// A single event name
    Single(String),
    /// Several event names, each subscribed independently (duplicates kept)
    Many(Vec<String>),
}

impl EventSelector {
    /// Event names in subscription order
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for EventSelector {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

impl From<String> for EventSelector {
    fn from(name: String) -> Self {
        Self::Single(name)
    }
}

impl From<Vec<String>> for EventSelector {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

impl From<Vec<&str>> for EventSelector {
    fn from(names: Vec<&str>) -> Self {
        Self::Many(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventSelector {
    fn from(names: [&str; N]) -> Self {
        Self::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

impl TryFrom<&Value> for EventSelector {
    type Error = EventError;

    /// Accepts a JSON string or an array of strings
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::Single(name.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name.clone()),
                    other => Err(EventError::InvalidEventKind(format!(
                        "array containing {}",
                        value_kind(other)
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Many),
            other => Err(EventError::InvalidEventKind(value_kind(other).to_string())),
        }
    }
}

/// Everything needed to register one or more subscriptions
#[derive(Clone)]
pub struct SubscribeDescriptor {
    /// Event name(s)
    pub event: EventSelector,

    /// Callback invoked after state amendment
    pub action: Action,

    /// Scope (defaults to the bus default scope)
    pub scope: Option<String>,

    /// Group label for bulk removal
    pub group: Option<String>,
}

impl SubscribeDescriptor {
    /// Subscribe `action` to `event` in the default scope
    pub fn new<F>(event: impl Into<EventSelector>, action: F) -> Self
    where
        F: Fn(&SourceEvent, &Value) -> CallbackResult<()> + Send + Sync + 'static,
    {
        Self {
            event: event.into(),
            action: Arc::new(action),
            scope: None,
            group: None,
        }
    }

    /// Set the scope
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the group label
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

impl fmt::Debug for SubscribeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeDescriptor")
            .field("event", &self.event)
            .field("scope", &self.scope)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// An active registration of one action for one event in one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Unique subscription identifier (sub-<uuid>)
    pub id: String,

    /// Optional group label; not unique
    #[serde(default)]
    pub group: Option<String>,

    /// Dispatch key the listener is registered under
    pub event: String,

    /// Scope this subscription belongs to
    pub scope: String,

    /// Host listener owned by this subscription
    pub listener: ListenerId,
}

impl Subscription {
    /// Create a subscription with a fresh id
    pub fn new(
        event: impl Into<String>,
        scope: impl Into<String>,
        group: Option<String>,
        listener: ListenerId,
    ) -> Self {
        Self {
            id: format!("sub-{}", uuid::Uuid::new_v4()),
            group,
            event: event.into(),
            scope: scope.into(),
            listener,
        }
    }
}

/// Structural filter for removing subscriptions
///
/// Each field left as `None` matches anything. An empty filter matches
/// every subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeFilter {
    /// Bare event name; resolved against `scope` or the default scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Group label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl UnsubscribeFilter {
    /// Filter matching everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Match by bare event name
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Match by scope
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Match by group
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.scope.is_none() && self.group.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_from_str_and_array() {
        assert_eq!(EventSelector::from("A"), EventSelector::Single("A".to_string()));
        let many = EventSelector::from(["A", "A"]);
        assert_eq!(many.names(), vec!["A", "A"]);
    }

    #[test]
    fn test_selector_try_from_value() {
        let single = EventSelector::try_from(&json!("SAVE")).unwrap();
        assert_eq!(single.names(), vec!["SAVE"]);

        let many = EventSelector::try_from(&json!(["A", "B"])).unwrap();
        assert_eq!(many.names(), vec!["A", "B"]);
    }

    #[test]
    fn test_selector_try_from_invalid_value() {
        let err = EventSelector::try_from(&json!({"event": "A"})).unwrap_err();
        assert!(matches!(err, EventError::InvalidEventKind(ref k) if k == "object"));

        let err = EventSelector::try_from(&json!(["A", 1])).unwrap_err();
        assert!(matches!(err, EventError::InvalidEventKind(ref k) if k.contains("number")));
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = Envelope::new(json!({"type": "click"}), "cart", json!({"qty": 2}));
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"domEvent\":{\"type\":\"click\"}"));
        assert!(json.contains("\"scope\":\"cart\""));

        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_envelope_defaults_missing_fields_to_null() {
        let parsed: Envelope = serde_json::from_str(r#"{"scope":"global"}"#).unwrap();
        assert_eq!(parsed.dom_event, Value::Null);
        assert_eq!(parsed.data, Value::Null);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let a = Subscription::new("GLOBAL_A", "global", None, ListenerId(1));
        let b = Subscription::new("GLOBAL_A", "global", None, ListenerId(1));
        assert!(a.id.starts_with("sub-"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_unsubscribe_filter_builder() {
        assert!(UnsubscribeFilter::all().is_empty());
        let filter = UnsubscribeFilter::all().event("A").group("g1");
        assert!(!filter.is_empty());
        assert_eq!(filter.event.as_deref(), Some("A"));
        assert!(filter.scope.is_none());
    }

    #[test]
    fn test_unsubscribe_filter_from_json() {
        let filter: UnsubscribeFilter = serde_json::from_str(r#"{"group":"g1"}"#).unwrap();
        assert_eq!(filter.group.as_deref(), Some("g1"));
        assert!(filter.event.is_none());

        let json = serde_json::to_string(&UnsubscribeFilter::all()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = SubscribeDescriptor::new("SAVE", |_, _| Ok(()))
            .scope("editor")
            .group("toolbar");
        assert_eq!(descriptor.scope.as_deref(), Some("editor"));
        assert_eq!(descriptor.group.as_deref(), Some("toolbar"));
        assert!(format!("{:?}", descriptor).contains("SAVE"));
    }
}
