//! Subscription registry
//!
//! An insertion-ordered, copy-on-write list of active subscriptions. Each
//! mutation swaps in a new list, so snapshots handed out by `list` are
//! never affected by later changes.

use crate::error::{EventError, Result};
use crate::provider::EventTarget;
use crate::types::{ListenerId, Subscription};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Filter with its event already resolved to a dispatch key
///
/// `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionMatch {
    /// Dispatch key
    pub event: Option<String>,
    /// Scope
    pub scope: Option<String>,
    /// Group label
    pub group: Option<String>,
}

impl SubscriptionMatch {
    /// Whether `sub` matches every provided field
    pub fn matches(&self, sub: &Subscription) -> bool {
        if self.event.as_ref().is_some_and(|event| *event != sub.event) {
            return false;
        }
        if self.scope.as_ref().is_some_and(|scope| *scope != sub.scope) {
            return false;
        }
        if self
            .group
            .as_ref()
            .is_some_and(|group| sub.group.as_ref() != Some(group))
        {
            return false;
        }
        true
    }
}

/// Ordered collection of active subscriptions
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<Arc<Vec<Subscription>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription
    pub fn add(&self, subscription: Subscription) -> Result<()> {
        let mut guard = self.subscriptions.write().map_err(poisoned)?;
        let mut next = Vec::clone(&guard);
        next.push(subscription);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Append several subscriptions in one swap
    pub fn extend(&self, subscriptions: Vec<Subscription>) -> Result<()> {
        let mut guard = self.subscriptions.write().map_err(poisoned)?;
        let mut next = Vec::clone(&guard);
        next.extend(subscriptions);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Defensive copy of the current subscriptions
    pub fn list(&self) -> Result<Vec<Subscription>> {
        let guard = self.subscriptions.read().map_err(poisoned)?;
        Ok(Vec::clone(&guard))
    }

    /// Number of active subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// True when nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in `subscriptions`, keeping host listeners in step
    ///
    /// Every entry must carry an `(event, listener)` pair that already
    /// belongs to a registered subscription, otherwise the call fails with
    /// `InvalidRegistryState` and nothing changes. Listeners of dropped
    /// subscriptions are deregistered from `target`. Returns the dropped
    /// subscriptions.
    pub fn replace_checked(
        &self,
        target: &dyn EventTarget,
        subscriptions: Vec<Subscription>,
    ) -> Result<Vec<Subscription>> {
        let mut guard = self.subscriptions.write().map_err(poisoned)?;

        let owned: HashSet<(&str, ListenerId)> = guard
            .iter()
            .map(|sub| (sub.event.as_str(), sub.listener))
            .collect();
        if let Some(stranger) = subscriptions
            .iter()
            .find(|sub| !owned.contains(&(sub.event.as_str(), sub.listener)))
        {
            return Err(EventError::InvalidRegistryState(format!(
                "subscription {} refers to {} under '{}' which this registry did not create",
                stranger.id, stranger.listener, stranger.event
            )));
        }

        let kept: HashSet<(&str, ListenerId)> = subscriptions
            .iter()
            .map(|sub| (sub.event.as_str(), sub.listener))
            .collect();
        let dropped: Vec<Subscription> = guard
            .iter()
            .filter(|sub| !kept.contains(&(sub.event.as_str(), sub.listener)))
            .cloned()
            .collect();

        for sub in &dropped {
            if let Err(e) = target.remove_listener(&sub.event, sub.listener) {
                tracing::warn!(
                    subscription = %sub.id,
                    error = %e,
                    "Failed to remove listener for dropped subscription"
                );
            }
        }

        *guard = Arc::new(subscriptions);
        Ok(dropped)
    }

    /// Remove every matching subscription and deregister its listener
    ///
    /// Listeners are removed from `target` before the registry is
    /// updated. Returns the removed subscriptions in registration order.
    pub fn remove_matching(
        &self,
        target: &dyn EventTarget,
        filter: &SubscriptionMatch,
    ) -> Result<Vec<Subscription>> {
        let mut guard = self.subscriptions.write().map_err(poisoned)?;
        let (removed, kept): (Vec<Subscription>, Vec<Subscription>) =
            guard.iter().cloned().partition(|sub| filter.matches(sub));

        for sub in &removed {
            match target.remove_listener(&sub.event, sub.listener) {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    subscription = %sub.id,
                    event = %sub.event,
                    listener = %sub.listener,
                    "Listener already gone during unsubscribe"
                ),
                Err(e) => tracing::warn!(
                    subscription = %sub.id,
                    event = %sub.event,
                    error = %e,
                    "Failed to remove listener during unsubscribe"
                ),
            }
        }

        *guard = Arc::new(kept);
        Ok(removed)
    }
}

fn poisoned(e: impl std::fmt::Display) -> EventError {
    EventError::Lock(format!("Subscription registry lock poisoned: {}", e))
}
