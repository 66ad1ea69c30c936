//! Dispatcher: installs amend-then-invoke handlers and raises envelopes
//!
//! A subscription's handler runs the state amendment for its scope first
//! and only then calls the subscriber action, so every action observes the
//! state produced by the event it is reacting to.

use crate::amend::Amender;
use crate::config::ScopingStrategy;
use crate::error::{EventError, Result};
use crate::provider::{EventTarget, Listener};
use crate::scope::ScopeNamer;
use crate::types::{Action, Envelope, ListenerId, SourceEvent};
use serde_json::Value;
use std::sync::Arc;

/// Raises events on, and installs handlers into, a host event target
#[derive(Clone)]
pub struct Dispatcher {
    target: Arc<dyn EventTarget>,
    namer: ScopeNamer,
    amender: Amender,
}

impl Dispatcher {
    /// Create a dispatcher over a target
    pub fn new(target: Arc<dyn EventTarget>, namer: ScopeNamer, amender: Amender) -> Self {
        Self {
            target,
            namer,
            amender,
        }
    }

    /// Key resolution in use
    pub fn namer(&self) -> &ScopeNamer {
        &self.namer
    }

    /// The host event target
    pub fn target(&self) -> &dyn EventTarget {
        self.target.as_ref()
    }

    /// The amendment pipeline handlers run
    pub fn amender(&self) -> &Amender {
        &self.amender
    }

    /// Wrap `action` in a handler for `event_name` in `scope`
    ///
    /// Under `PayloadFilter`, envelopes from another scope are ignored
    /// without amending or invoking the action.
    pub fn handler(&self, event_name: &str, scope: &str, action: Action) -> Listener {
        let amender = self.amender.clone();
        let filter_by_payload = self.namer.strategy() == ScopingStrategy::PayloadFilter;
        let event_name = event_name.to_string();
        let scope = scope.to_string();

        Arc::new(move |key: &str, envelope: &Envelope| -> Result<()> {
            if filter_by_payload && envelope.scope != scope {
                return Ok(());
            }

            amender.amend(&event_name, &envelope.data, &scope)?;

            let source = SourceEvent {
                key: key.to_string(),
                detail: envelope.clone(),
            };
            action(&source, &envelope.dom_event).map_err(|source| EventError::Action {
                event: key.to_string(),
                source,
            })
        })
    }

    /// Install a handler for `event_name` in `scope` on the target
    ///
    /// Returns the dispatch key and the listener handle.
    pub fn install(
        &self,
        event_name: &str,
        scope: &str,
        action: Action,
    ) -> Result<(String, ListenerId)> {
        let key = self.namer.dispatch_key(event_name, Some(scope));
        let listener = self.handler(event_name, scope, action);
        let id = self.target.add_listener(&key, listener)?;
        Ok((key, id))
    }

    /// Raise `event_name` in `scope` with an envelope of `dom_event` and `data`
    ///
    /// Every matching handler runs, in registration order, before this
    /// returns. The first handler error stops the dispatch.
    pub fn publish(
        &self,
        event_name: &str,
        dom_event: Value,
        scope: Option<&str>,
        data: Value,
    ) -> Result<()> {
        let scope = self.namer.resolve_scope(scope);
        let key = self.namer.dispatch_key(event_name, Some(scope));
        let envelope = Envelope::new(dom_event, scope, data);

        tracing::debug!(event = event_name, scope = scope, key = %key, "Publishing event");
        self.target.raise(&key, &envelope)
    }
}
