//! Typed publish/subscribe for registry changes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::template::TemplateId;

const BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Used,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
            EventKind::Used => "used",
        };
        f.write_str(name)
    }
}

/// A change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEvent {
    pub kind: EventKind,
    pub template_id: TemplateId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TemplateEvent {
    pub fn new(kind: EventKind, template_id: TemplateId, timestamp: OffsetDateTime) -> Self {
        Self {
            kind,
            template_id,
            timestamp,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

type Handler = Arc<dyn Fn(&TemplateEvent) + Send + Sync>;

struct Listener {
    id: u64,
    kind: Option<EventKind>,
    handler: Handler,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<Listener>,
}

impl Listeners {
    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|listener| listener.id != id);
        self.entries.len() != before
    }
}

/// Registry event fan-out.
///
/// Callback handlers are registered per kind or for every kind and stay
/// active until their [`Subscription`] is dropped. Async consumers can use
/// [`EventChannel::listen`] instead. Nothing is buffered for late
/// subscribers.
pub struct EventChannel {
    listeners: Arc<Mutex<Listeners>>,
    sender: broadcast::Sender<TemplateEvent>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            listeners: Arc::default(),
            sender,
        }
    }

    /// Call `handler` for every event of `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&TemplateEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler))
    }

    /// Call `handler` for every event
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TemplateEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    fn register(&self, kind: Option<EventKind>, handler: Handler) -> Subscription {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push(Listener { id, kind, handler });

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// A receiver for every event emitted from now on
    pub fn listen(&self) -> broadcast::Receiver<TemplateEvent> {
        self.sender.subscribe()
    }

    /// Deliver an event to every matching handler and listener
    pub fn emit(&self, event: TemplateEvent) {
        // Handlers run outside the lock so they may subscribe or unsubscribe
        let handlers: Vec<Handler> = {
            let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners
                .entries
                .iter()
                .filter(|listener| listener.kind.is_none_or(|kind| kind == event.kind))
                .map(|listener| Arc::clone(&listener.handler))
                .collect()
        };

        for handler in handlers {
            handler(&event);
        }

        // No receivers is not an error
        let _ = self.sender.send(event);
    }

    pub fn handler_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("handlers", &self.handler_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

/// Keeps a handler registered; dropping it unsubscribes
#[must_use = "the handler is removed as soon as the subscription is dropped"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Removal happens in Drop
    }

    fn detach(&self) -> bool {
        match self.listeners.upgrade() {
            Some(listeners) => listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
