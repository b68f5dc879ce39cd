// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatch to registered listeners.
//!
//! Listeners are registered per [`EventKind`] and invoked in registration
//! order. A listener that returns an error or panics is logged and skipped;
//! the remaining listeners still run.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use sb_core::{Envelope, Event, EventKind};

/// Error type returned by listeners.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// A callback invoked for each event of the kind it was registered for.
pub type Listener = Arc<dyn Fn(&Event) -> Result<(), ListenerError> + Send + Sync>;

/// Handle returned by [`Dispatcher::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// The event kind this subscription listens to.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}

struct Registration {
    id: u64,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<Registration>>,
}

/// Routes decoded inbound events to listeners.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        // Listeners never run under the lock, so a poisoned registry is still consistent
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a listener for `kind`.
    ///
    /// The same closure may be registered more than once; each registration
    /// is invoked separately.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.subscribe_listener(kind, Arc::new(listener))
    }

    /// Registers an already shared listener for `kind`.
    pub fn subscribe_listener(&self, kind: EventKind, listener: Listener) -> Subscription {
        let mut registry = self.registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(kind.clone())
            .or_default()
            .push(Registration { id, listener });
        Subscription { kind, id }
    }

    /// Removes the registration behind `subscription`.
    ///
    /// Returns `false` if it was already removed.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut registry = self.registry();
        let Some(list) = registry.listeners.get_mut(&subscription.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != subscription.id);
        let removed = list.len() != before;
        if list.is_empty() {
            registry.listeners.remove(&subscription.kind);
        }
        removed
    }

    /// Removes the first registration of `listener` for `kind`.
    ///
    /// Listeners are compared by identity. Returns `false` if none matched.
    pub fn unsubscribe_listener(&self, kind: &EventKind, listener: &Listener) -> bool {
        let mut registry = self.registry();
        let Some(list) = registry.listeners.get_mut(kind) else {
            return false;
        };
        let Some(pos) = list.iter().position(|r| Arc::ptr_eq(&r.listener, listener)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            registry.listeners.remove(kind);
        }
        true
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.registry().listeners.get(kind).map_or(0, Vec::len)
    }

    /// Decodes `envelope` and delivers it to the listeners for its kind.
    ///
    /// Returns the decoded event, or `None` if the payload failed its schema.
    /// An undecodable payload is logged and dropped without reaching any
    /// listener.
    pub fn dispatch(&self, envelope: &Envelope) -> Option<Event> {
        match Event::decode(envelope) {
            Ok(event) => {
                self.dispatch_event(&event);
                Some(event)
            }
            Err(e) => {
                tracing::warn!(kind = envelope.kind(), error = %e, "dropping undecodable event");
                None
            }
        }
    }

    /// Delivers an already decoded event. Returns how many listeners ran
    /// without failing.
    pub fn dispatch_event(&self, event: &Event) -> usize {
        let kind = event.kind();
        // Snapshot so listeners may (un)subscribe without deadlocking
        let listeners: Vec<Listener> = match self.registry().listeners.get(&kind) {
            Some(list) => list.iter().map(|r| Arc::clone(&r.listener)).collect(),
            None => {
                tracing::trace!(%kind, "no listeners");
                return 0;
            }
        };

        let mut ok = 0;
        for listener in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    tracing::error!(%kind, error = %e, "listener failed");
                }
                Err(_) => {
                    tracing::error!(%kind, "listener panicked");
                }
            }
        }
        ok
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry();
        let counts: HashMap<&str, usize> = registry
            .listeners
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("Dispatcher").field("listeners", &counts).finish()
    }
}
