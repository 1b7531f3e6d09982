//! Store notifications and the observer registry.
//!
//! Every store owns a [`Notifier`]. After a transform has been applied and
//! persisted the store emits a [`DidTransform`] event; handlers registered for
//! [`EventKind::DidTransform`] run synchronously, in registration order.

use crate::{Record, Transform};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Notification names a store can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DidTransform,
}

/// Emitted once per successfully applied transform.
#[derive(Debug, Clone, PartialEq)]
pub struct DidTransform {
    /// The transform exactly as the store was invoked with it
    pub transform: Transform,
    /// Resulting record; for `remove`, the record that was dropped, if known
    pub record: Option<Record>,
}

/// Events delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    DidTransform(DidTransform),
}

impl StoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StoreEvent::DidTransform(_) => EventKind::DidTransform,
        }
    }
}

/// Handle returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Observer registry. Clones share the same handlers.
#[derive(Clone, Default)]
pub struct Notifier {
    handlers: Arc<DashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: Arc<AtomicU64>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for mut entry in self.handlers.iter_mut() {
            let before = entry.len();
            entry.retain(|(sub, _)| *sub != id);
            removed |= entry.len() != before;
        }
        removed
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.handlers
            .iter()
            .any(|entry| entry.iter().any(|(sub, _)| *sub == id))
    }

    /// Number of handlers registered for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(|h| h.len()).unwrap_or(0)
    }

    /// Deliver an event to every handler of its kind.
    pub fn emit(&self, event: StoreEvent) {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<Handler> = match self.handlers.get(&event.kind()) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };

        tracing::trace!(kind = ?event.kind(), handlers = handlers.len(), "emit");
        for handler in handlers {
            handler(&event);
        }
    }

    pub(crate) fn did_transform(&self, transform: Transform, record: Option<Record>) {
        self.emit(StoreEvent::DidTransform(DidTransform { transform, record }));
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field(
                "did_transform",
                &self.subscriber_count(EventKind::DidTransform),
            )
            .finish()
    }
}
