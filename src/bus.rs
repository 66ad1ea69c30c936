//! High-level scoped event bus
//!
//! `EventBus` ties the pieces together: it owns the subscription registry,
//! the modifier chain and the state store, and drives the host event target
//! through a `Dispatcher`. One bus is meant to live for the whole session;
//! share it by reference or `Arc`.

use crate::amend::{Amender, ModifierChain, RegisteredModifier};
use crate::config::BusConfig;
use crate::dispatch::Dispatcher;
use crate::error::{CallbackResult, EventError, Result};
use crate::provider::memory::{MemoryEventTarget, MemorySessionStorage};
use crate::provider::{EventTarget, Listener, SessionStorage};
use crate::registry::{SubscriptionMatch, SubscriptionRegistry};
use crate::scope::{scope_from_value, ScopeNamer};
use crate::state::{StateContainer, StateStore};
use crate::types::{
    Action, Envelope, EventSelector, ListenerId, SubscribeDescriptor, Subscription,
    UnsubscribeFilter,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Scoped publish/subscribe bus over shared session state
pub struct EventBus {
    config: BusConfig,
    target: Arc<dyn EventTarget>,
    dispatcher: Dispatcher,
    registry: SubscriptionRegistry,
    modifiers: Arc<ModifierChain>,
    state: Arc<StateStore>,

    /// Startup hook listener (ready signal key, handle)
    ready_hook: Mutex<Option<(String, ListenerId)>>,
}

impl EventBus {
    /// Create a bus with the default configuration
    ///
    /// A failure to attach the startup hook is logged, not returned.
    pub fn new(target: Arc<dyn EventTarget>, storage: Arc<dyn SessionStorage>) -> Self {
        let bus = Self::build(target, storage, BusConfig::default());
        if let Err(e) = bus.install_ready_hook() {
            tracing::warn!(error = %e, "Failed to attach startup hook");
        }
        bus
    }

    /// Create a bus with an explicit configuration
    pub fn with_config(
        target: Arc<dyn EventTarget>,
        storage: Arc<dyn SessionStorage>,
        config: BusConfig,
    ) -> Result<Self> {
        config.validate()?;
        let bus = Self::build(target, storage, config);
        bus.install_ready_hook()?;
        Ok(bus)
    }

    /// Create a bus over fresh in-memory host primitives
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryEventTarget::new()),
            Arc::new(MemorySessionStorage::new()),
        )
    }

    fn build(
        target: Arc<dyn EventTarget>,
        storage: Arc<dyn SessionStorage>,
        config: BusConfig,
    ) -> Self {
        let state = Arc::new(StateStore::new(storage, config.storage_key.clone()));
        let modifiers = Arc::new(ModifierChain::new());
        let namer = ScopeNamer::new(config.scoping, config.default_scope.clone());
        let amender = Amender::new(state.clone(), modifiers.clone());
        let dispatcher = Dispatcher::new(target.clone(), namer, amender);

        Self {
            config,
            target,
            dispatcher,
            registry: SubscriptionRegistry::new(),
            modifiers,
            state,
            ready_hook: Mutex::new(None),
        }
    }

    /// Republish the host ready signal as the bus content-loaded event
    fn install_ready_hook(&self) -> Result<()> {
        let Some(signal) = self.config.ready_signal.clone() else {
            return Ok(());
        };

        // Weak: the target owns this listener
        let target = Arc::downgrade(&self.target);
        let namer = self.dispatcher.namer().clone();
        let event = self.config.content_loaded_event.clone();
        let listener: Listener = Arc::new(move |key: &str, envelope: &Envelope| -> Result<()> {
            let Some(target) = target.upgrade() else {
                return Ok(());
            };
            tracing::info!(signal = key, event = %event, "Host content ready");

            let republished = Envelope::new(
                envelope.dom_event.clone(),
                namer.default_scope(),
                Value::Null,
            );
            target.raise(&namer.dispatch_key(&event, None), &republished)
        });

        let id = self.target.add_listener(&signal, listener)?;
        *self.ready_hook.lock().map_err(poisoned)? = Some((signal, id));
        Ok(())
    }

    /// Active configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Host event target
    pub fn target(&self) -> &dyn EventTarget {
        self.target.as_ref()
    }

    // ─── Subscriptions ───────────────────────────────────────────────

    /// Register `descriptor.action` for every event name it selects
    ///
    /// Each name yields its own subscription, duplicates included.
    /// Returns the created subscriptions in order. The call is all or
    /// nothing: if any name fails, listeners already installed for the
    /// other names are removed and nothing is registered.
    pub fn subscribe(&self, descriptor: SubscribeDescriptor) -> Result<Vec<Subscription>> {
        let scope = descriptor
            .scope
            .as_deref()
            .unwrap_or(&self.config.default_scope)
            .to_string();

        let mut created = Vec::new();
        for name in descriptor.event.names() {
            match self
                .dispatcher
                .install(name, &scope, descriptor.action.clone())
            {
                Ok((key, listener)) => created.push(Subscription::new(
                    key,
                    scope.clone(),
                    descriptor.group.clone(),
                    listener,
                )),
                Err(e) => {
                    self.roll_back(&created);
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.registry.extend(created.clone()) {
            self.roll_back(&created);
            return Err(e);
        }

        for subscription in &created {
            tracing::info!(
                subscription = %subscription.id,
                event = %subscription.event,
                scope = %subscription.scope,
                group = ?subscription.group,
                "Subscribed"
            );
        }
        Ok(created)
    }

    fn roll_back(&self, created: &[Subscription]) {
        for sub in created {
            if let Err(e) = self.target.remove_listener(&sub.event, sub.listener) {
                tracing::warn!(
                    subscription = %sub.id,
                    event = %sub.event,
                    error = %e,
                    "Failed to remove listener while rolling back subscribe"
                );
            }
        }
    }

    /// Register an action from a dynamically typed descriptor
    ///
    /// `descriptor` is a JSON object `{event, scope?, group?}`. `event`
    /// must be a string or an array of strings (`InvalidEventKind`),
    /// `scope` a string (`InvalidScopeKind`).
    pub fn subscribe_value<F>(&self, descriptor: &Value, action: F) -> Result<Vec<Subscription>>
    where
        F: Fn(&crate::types::SourceEvent, &Value) -> CallbackResult<()> + Send + Sync + 'static,
    {
        let event = EventSelector::try_from(descriptor.get("event").unwrap_or(&Value::Null))?;
        let scope = scope_from_value(
            descriptor.get("scope").unwrap_or(&Value::Null),
            &self.config.default_scope,
        )?;
        let group = match descriptor.get("group") {
            None | Some(Value::Null) => None,
            Some(Value::String(group)) => Some(group.clone()),
            Some(other) => {
                return Err(EventError::Config(format!(
                    "Subscription group must be a string, got {}",
                    crate::error::value_kind(other)
                )))
            }
        };

        let action: Action = Arc::new(action);
        self.subscribe(SubscribeDescriptor {
            event,
            action,
            scope: Some(scope),
            group,
        })
    }

    /// Remove every subscription matching `filter`
    ///
    /// An `event` without a `scope` only matches the default scope. An
    /// empty filter removes everything. Returns the removed subscriptions.
    pub fn unsubscribe(&self, filter: UnsubscribeFilter) -> Result<Vec<Subscription>> {
        let namer = self.dispatcher.namer();
        let scope = match (&filter.event, filter.scope) {
            (Some(_), None) => Some(namer.default_scope().to_string()),
            (_, scope) => scope,
        };
        let resolved = SubscriptionMatch {
            event: filter
                .event
                .as_deref()
                .map(|event| namer.dispatch_key(event, scope.as_deref())),
            scope,
            group: filter.group,
        };

        let removed = self.registry.remove_matching(self.target.as_ref(), &resolved)?;

        tracing::info!(
            event = ?resolved.event,
            scope = ?resolved.scope,
            group = ?resolved.group,
            removed = removed.len(),
            "Unsubscribed"
        );
        Ok(removed)
    }

    /// Remove every subscription
    pub fn unsubscribe_all(&self) -> Result<Vec<Subscription>> {
        self.unsubscribe(UnsubscribeFilter::all())
    }

    /// Snapshot of the active subscriptions in registration order
    pub fn get_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.registry.list()
    }

    /// Replace the registry with `subscriptions`
    ///
    /// Every entry must come from this bus (its event key and listener
    /// belong to a current subscription), otherwise the call fails with
    /// `InvalidRegistryState` and nothing changes. Listeners of
    /// subscriptions dropped from the registry are removed.
    pub fn set_subscriptions(&self, subscriptions: Vec<Subscription>) -> Result<()> {
        let dropped = self
            .registry
            .replace_checked(self.target.as_ref(), subscriptions)?;
        tracing::info!(dropped = dropped.len(), "Subscriptions replaced");
        Ok(())
    }

    // ─── Publishing ──────────────────────────────────────────────────

    /// Publish `event_name` in `scope` (default scope if `None`)
    ///
    /// Runs every matching handler synchronously; the first failing
    /// modifier or action aborts the rest of the dispatch and is returned.
    pub fn publish(
        &self,
        event_name: &str,
        dom_event: Value,
        scope: Option<&str>,
        data: Value,
    ) -> Result<()> {
        self.dispatcher.publish(event_name, dom_event, scope, data)
    }

    // ─── State ───────────────────────────────────────────────────────

    fn scope<'a>(&'a self, scope: Option<&'a str>) -> &'a str {
        scope.unwrap_or(&self.config.default_scope)
    }

    /// State of `scope`, or `None` if never set
    pub fn get_state(&self, scope: Option<&str>) -> Option<Value> {
        self.state.get(self.scope(scope))
    }

    /// State of `scope` deserialized into `T`
    pub fn get_state_as<T: DeserializeOwned>(&self, scope: Option<&str>) -> Result<Option<T>> {
        self.state.get_as(self.scope(scope))
    }

    /// Snapshot of every scope's state
    pub fn get_all_state(&self) -> StateContainer {
        self.state.all()
    }

    /// Replace the state of `scope`
    pub fn set_state<T: Serialize + ?Sized>(&self, value: &T, scope: Option<&str>) -> Result<()> {
        self.state.set(value, self.scope(scope))
    }

    /// Clear the state of every scope
    pub fn reset_all_state(&self) -> Result<()> {
        self.state.reset_all()
    }

    /// Run the amendment pipeline for `scope` outside of a publish
    pub fn amend_state(&self, event_name: &str, data: &Value, scope: Option<&str>) -> Result<()> {
        self.dispatcher
            .amender()
            .amend(event_name, data, self.scope(scope))
    }

    /// Append a state modifier for `scope`
    pub fn add_state_modifier<F>(&self, modifier: F, scope: Option<&str>) -> Result<()>
    where
        F: Fn(&str, Option<Value>, &str, &Value) -> CallbackResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        let scope = self.scope(scope).to_string();
        self.modifiers.add(RegisteredModifier::new(modifier, scope))
    }

    /// Snapshot of the modifier chain
    pub fn get_state_modifiers(&self) -> Result<Vec<RegisteredModifier>> {
        self.modifiers.list()
    }

    /// Replace the modifier chain
    pub fn set_state_modifiers(&self, modifiers: Vec<RegisteredModifier>) -> Result<()> {
        self.modifiers.replace(modifiers)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Drop every subscription and modifier and clear all state
    pub fn reset_all(&self) -> Result<()> {
        self.unsubscribe_all()?;
        self.modifiers.replace(Vec::new())?;
        self.state.reset_all()
    }

    /// `reset_all` and detach the startup hook
    pub fn dispose(&self) -> Result<()> {
        self.reset_all()?;
        if let Some((signal, id)) = self.ready_hook.lock().map_err(poisoned)?.take() {
            self.target.remove_listener(&signal, id)?;
        }
        tracing::info!("Event bus disposed");
        Ok(())
    }
}

fn poisoned(e: impl std::fmt::Display) -> EventError {
    EventError::Lock(format!("Event bus lock poisoned: {}", e))
}
