//! # a3s-statebus
//!
//! Scoped in-process event bus with reducer-driven shared session state.
//!
//! ## Overview
//!
//! `a3s-statebus` lets unrelated components talk through named events
//! without knowing about each other. Events and state are partitioned by
//! *scope*. Before a subscriber runs, the bus folds the event payload
//! through the scope's state modifiers (pure reducers) and commits the
//! result, so every subscriber sees state that already reflects the event.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_statebus::{EventBus, SubscribeDescriptor, UnsubscribeFilter};
//! use serde_json::{json, Value};
//!
//! # fn example() -> a3s_statebus::Result<()> {
//! let bus = EventBus::in_memory();
//!
//! // Count items added to the cart scope
//! bus.add_state_modifier(
//!     |event, state, _scope, data| {
//!         let count = state.as_ref().and_then(|s| s["count"].as_u64()).unwrap_or(0);
//!         Ok(match event {
//!             "ADD_ITEM" => Some(json!({"count": count + data["qty"].as_u64().unwrap_or(1)})),
//!             _ => state,
//!         })
//!     },
//!     Some("cart"),
//! )?;
//!
//! bus.subscribe(
//!     SubscribeDescriptor::new("ADD_ITEM", |source, _dom| {
//!         println!("{} in scope {}", source.key, source.detail.scope);
//!         Ok(())
//!     })
//!     .scope("cart")
//!     .group("cart-widgets"),
//! )?;
//!
//! bus.publish("ADD_ITEM", Value::Null, Some("cart"), json!({"qty": 2}))?;
//! assert_eq!(bus.get_state(Some("cart")), Some(json!({"count": 2})));
//!
//! bus.unsubscribe(UnsubscribeFilter::all().group("cart-widgets"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **EventTarget** / **SessionStorage** traits — host primitives the bus
//!   consumes (in-memory implementations in `provider::memory`)
//! - **ScopeNamer** — `(event, scope)` → dispatch key
//! - **StateStore** — all scopes in one serialized session blob
//! - **Amender** — folds per-scope modifiers over state
//! - **SubscriptionRegistry** — ordered, copy-on-write subscription list
//! - **Dispatcher** — amend-then-invoke handlers and envelope publishing
//! - **EventBus** — the public facade tying it together

pub mod amend;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod provider;
pub mod registry;
pub mod scope;
pub mod state;
pub mod types;

// Re-export core types
pub use amend::{Amender, ModifierChain, ModifierFn, RegisteredModifier, StateModifier};
pub use bus::EventBus;
pub use config::{BusConfig, ScopingStrategy, DEFAULT_SCOPE};
pub use dispatch::Dispatcher;
pub use error::{CallbackError, CallbackResult, EventError, Result};
pub use provider::{EventTarget, Listener, SessionStorage};
pub use registry::{SubscriptionMatch, SubscriptionRegistry};
pub use scope::{canonical_key, scope_from_value, ScopeNamer};
pub use state::{StateContainer, StateStore};
pub use types::{
    Action, Envelope, EventSelector, ListenerId, SourceEvent, SubscribeDescriptor, Subscription,
    UnsubscribeFilter,
};

// Re-export in-memory host primitives for convenience
pub use provider::memory::{MemoryEventTarget, MemorySessionStorage};
