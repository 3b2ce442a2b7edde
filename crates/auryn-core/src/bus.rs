//! EventBus — synchronous, ordered publish/subscribe with a bounded lookback history.
//!
//! Delivery is fire-and-forget: `publish` walks the matching subscriptions in registration
//! order on the caller's thread. The event's `priority` is metadata for consumers; the bus
//! never reorders by it. A handler that fails (returns `Err` or panics) is isolated: later
//! handlers still receive the event, and the failure is republished as an `Error` event.
//!
//! The bus only keeps a weak reference to each handler. The [`Subscription`] returned by
//! `subscribe*` owns the handler, so dropping it makes the registration inert.

use std::collections::{BTreeSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::BusError;
use crate::events::{Event, EventType};
use crate::{lock, panic_message};

/// Lookback buffer size used when no config says otherwise.
pub const HISTORY_CAPACITY: usize = 100;

/// Source name stamped on events the bus publishes itself.
pub const BUS_SOURCE: &str = "event_bus";

/// Something that reacts to events.
pub type EventHandler = dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync;

/// Which event types a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    Only(EventType),
    AnyOf(BTreeSet<EventType>),
    All,
}

impl EventFilter {
    pub fn matches(&self, event_type: EventType) -> bool {
        match self {
            EventFilter::Only(t) => *t == event_type,
            EventFilter::AnyOf(types) => types.contains(&event_type),
            EventFilter::All => true,
        }
    }
}

/// Handle for one registration. Owns the handler; dropping it cancels delivery.
#[must_use = "dropping a Subscription stops delivery to its handler"]
pub struct Subscription {
    id: u64,
    bus_id: Uuid,
    name: String,
    _handler: Arc<EventHandler>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

struct Entry {
    id: u64,
    name: String,
    filter: EventFilter,
    handler: Weak<EventHandler>,
}

struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
    closed: bool,
}

/// The process-wide event router. Share it as `Arc<EventBus>`.
pub struct EventBus {
    id: Uuid,
    capacity: usize,
    registry: Mutex<Registry>,
    history: Mutex<VecDeque<Event>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Bus with a custom history capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id: Uuid::new_v4(),
            capacity,
            registry: Mutex::new(Registry {
                next_id: 1,
                entries: Vec::new(),
                closed: false,
            }),
            history: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn history_capacity(&self) -> usize {
        self.capacity
    }

    // ── Subscribing ──

    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> Result<Subscription, BusError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_filtered(
            format!("{}_subscriber", event_type),
            EventFilter::Only(event_type),
            handler,
        )
    }

    pub fn subscribe_all<F>(&self, handler: F) -> Result<Subscription, BusError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_filtered("all_subscriber", EventFilter::All, handler)
    }

    pub fn subscribe_multiple<F>(
        &self,
        event_types: &[EventType],
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let types: BTreeSet<EventType> = event_types.iter().copied().collect();
        self.subscribe_filtered("multi_subscriber", EventFilter::AnyOf(types), handler)
    }

    /// General form: `name` identifies the subscriber in `Error` events about its failures.
    pub fn subscribe_filtered<F>(
        &self,
        name: impl Into<String>,
        filter: EventFilter,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Arc<EventHandler> = Arc::new(handler);
        let name = name.into();
        let mut reg = lock(&self.registry);
        if reg.closed {
            return Err(BusError::Closed);
        }
        let id = reg.next_id;
        reg.next_id += 1;
        reg.entries.push(Entry {
            id,
            name: name.clone(),
            filter,
            handler: Arc::downgrade(&handler),
        });
        debug!("Subscription {} ({}) registered", id, name);
        Ok(Subscription {
            id,
            bus_id: self.id,
            name,
            _handler: handler,
        })
    }

    // ── Cancelling ──

    /// Cancel one registration. Returns `Ok(false)` if it was already cancelled.
    pub fn unsubscribe(&self, subscription: &Subscription) -> Result<bool, BusError> {
        if subscription.bus_id != self.id {
            return Err(BusError::ForeignSubscription {
                subscription: subscription.id,
            });
        }
        let mut reg = lock(&self.registry);
        let before = reg.entries.len();
        reg.entries.retain(|e| e.id != subscription.id);
        Ok(reg.entries.len() != before)
    }

    /// Cancel every registration for `event_type`. Single-type subscriptions are removed;
    /// multi-type subscriptions lose that type (and are removed once empty). Subscriptions
    /// to all types are left alone. Returns how many registrations were affected.
    pub fn unsubscribe_type(&self, event_type: EventType) -> usize {
        let mut reg = lock(&self.registry);
        let mut affected = 0;
        reg.entries.retain_mut(|e| match &mut e.filter {
            EventFilter::Only(t) => {
                let hit = *t == event_type;
                if hit {
                    affected += 1;
                }
                !hit
            }
            EventFilter::AnyOf(types) => {
                if types.remove(&event_type) {
                    affected += 1;
                }
                !types.is_empty()
            }
            EventFilter::All => true,
        });
        affected
    }

    /// Cancel all registrations. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut reg = lock(&self.registry);
        let removed = reg.entries.len();
        reg.entries.clear();
        removed
    }

    /// Clear all registrations and refuse further `publish`/`subscribe` calls.
    pub fn close(&self) {
        let mut reg = lock(&self.registry);
        if reg.closed {
            return;
        }
        reg.entries.clear();
        reg.closed = true;
        debug!("Event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.registry).closed
    }

    /// Number of registrations whose handler is still alive.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry)
            .entries
            .iter()
            .filter(|e| e.handler.strong_count() > 0)
            .count()
    }

    // ── Publishing ──

    pub fn publish(&self, event: Event) -> Result<(), BusError> {
        let event_type = event.event_type();
        let targets: Vec<(String, Arc<EventHandler>)> = {
            let mut reg = lock(&self.registry);
            if reg.closed {
                return Err(BusError::Closed);
            }
            reg.entries.retain(|e| e.handler.strong_count() > 0);
            reg.entries
                .iter()
                .filter(|e| e.filter.matches(event_type))
                .filter_map(|e| e.handler.upgrade().map(|h| (e.name.clone(), h)))
                .collect()
        };

        debug!(
            "Publishing {} from {} to {} subscriber(s)",
            event_type,
            event.source(),
            targets.len()
        );

        let mut failures: Vec<(String, String)> = Vec::new();
        for (name, handler) in &targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("handler panicked: {}", panic_message(payload.as_ref())),
            };
            failures.push((name.clone(), message));
        }

        let event_id = event.id();
        self.record(event);

        for (name, message) in failures {
            if event_type == EventType::Error {
                error!("Handler {} failed on an error event: {}", name, message);
                continue;
            }
            warn!("Handler {} failed on {}: {}", name, event_type, message);
            let report = Event::error(BUS_SOURCE, name, message, Some(event_id));
            if let Err(e) = self.publish(report) {
                error!("Could not report handler failure: {}", e);
            }
        }
        Ok(())
    }

    fn record(&self, event: Event) {
        let mut history = lock(&self.history);
        while history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(event);
    }

    // ── Diagnostics ──

    /// Snapshot of the lookback buffer, oldest first.
    pub fn history(&self) -> Vec<Event> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn events_by_type(&self, event_type: EventType) -> Vec<Event> {
        lock(&self.history)
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
