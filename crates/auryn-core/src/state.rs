//! StateStore — the agent's mutable continuum (mood, energy, focus, last input).
//!
//! Every mutation goes through [`StateStore::set`], which normalizes the value, stores it,
//! and publishes `StateChange` (plus `EnergyChange`/`MoodChange` for those keys) only when
//! the stored value actually changed.
//!
//! Announcements leave through an outbox filled under the entries lock, so subscribers see
//! changes in exactly the order they were stored. Whichever `set` call finds the outbox idle
//! drains it; a concurrent or nested `set` only enqueues and returns. A change whose
//! `StateChange` could not be published because the bus closed is rolled back.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::error::{BusError, StateError};
use crate::events::{EnergyChangeData, Event, EventPayload, MoodChangeData, StateChangeData};
use crate::lifecycle::{Lifecycle, LifecycleState, Module, Transition};
use crate::lock;
use crate::types::*;

/// Source name stamped on events the store publishes.
pub const STATE_SOURCE: &str = "state_store";

/// Energy assumed by `update_energy` when the key is absent.
pub const ENERGY_FALLBACK: i64 = 100;

/// The canonical continuum seeded by `initialize_defaults`.
pub fn default_entries() -> Vec<(&'static str, StateValue)> {
    vec![
        (KEY_MOOD, StateValue::Mood(Mood::Neutral)),
        (KEY_FOCUS, StateValue::Text("listening".into())),
        (KEY_CONTEXT_MODE, StateValue::Text("general".into())),
        (KEY_ENERGY, StateValue::Integer(ENERGY_MAX)),
        (KEY_LAST_INPUT, StateValue::Text(String::new())),
    ]
}

/// A stored change waiting to be announced.
struct Pending {
    ticket: u64,
    key: String,
    old: Option<StateValue>,
    new: StateValue,
    change: Event,
    follow_up: Option<Event>,
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<Pending>,
    draining: bool,
    next_ticket: u64,
}

pub struct StateStore {
    bus: Arc<EventBus>,
    entries: Mutex<HashMap<String, StateValue>>,
    outbox: Mutex<Outbox>,
    lifecycle: Lifecycle,
}

impl StateStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            entries: Mutex::new(HashMap::new()),
            outbox: Mutex::new(Outbox::default()),
            lifecycle: Lifecycle::new(),
        }
    }

    fn ensure_ready(&self) -> Result<(), StateError> {
        match self.lifecycle.state() {
            LifecycleState::Shutdown => Err(StateError::ShutDown),
            s if s.is_ready() => Ok(()),
            _ => Err(StateError::NotInitialized),
        }
    }

    /// Enforce per-key invariants: energy is an integer in [0,100], mood is in the vocabulary.
    fn normalize(key: &str, value: StateValue) -> Result<StateValue, StateError> {
        match key {
            KEY_ENERGY => match value {
                StateValue::Integer(n) => Ok(StateValue::Integer(clamp_energy(n))),
                StateValue::Float(x) if x.is_finite() => {
                    Ok(StateValue::Integer(clamp_energy(x.round() as i64)))
                }
                other => Err(StateError::InvalidValue {
                    key: key.to_string(),
                    kind: other.kind(),
                }),
            },
            KEY_MOOD => match value {
                StateValue::Mood(m) => Ok(StateValue::Mood(m)),
                StateValue::Text(s) => Mood::parse(&s)
                    .map(StateValue::Mood)
                    .ok_or(StateError::UnknownMood { value: s }),
                other => Err(StateError::InvalidValue {
                    key: key.to_string(),
                    kind: other.kind(),
                }),
            },
            _ => Ok(value),
        }
    }

    /// Store `value` under `key`. Returns `Ok(true)` if the stored value changed.
    ///
    /// When another `set` is already announcing (on another thread, or further up this
    /// thread's stack from inside a handler), this change is queued behind it and `set`
    /// returns before subscribers have seen it.
    pub fn set(&self, key: &str, value: impl Into<StateValue>) -> Result<bool, StateError> {
        self.ensure_ready()?;
        let value = Self::normalize(key, value.into())?;

        let ticket = {
            let mut entries = lock(&self.entries);
            if self.bus.is_closed() {
                return Err(BusError::Closed.into());
            }
            let old = entries.get(key).cloned();
            if old.as_ref() == Some(&value) {
                return Ok(false);
            }
            entries.insert(key.to_string(), value.clone());

            debug!(
                "State {}: {} -> {}",
                key,
                old.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "<absent>".into()),
                value
            );

            let mut outbox = lock(&self.outbox);
            let ticket = outbox.next_ticket;
            outbox.next_ticket += 1;
            outbox.queue.push_back(Self::pending(ticket, key, old, value));
            ticket
        };

        self.flush(ticket)
    }

    fn pending(ticket: u64, key: &str, old: Option<StateValue>, new: StateValue) -> Pending {
        let follow_up = match key {
            KEY_ENERGY => new.as_integer().map(|n| {
                EventPayload::EnergyChange(EnergyChangeData {
                    old: old.as_ref().and_then(StateValue::as_integer),
                    new: n,
                })
            }),
            KEY_MOOD => new.as_mood().map(|m| {
                EventPayload::MoodChange(MoodChangeData {
                    old: old.as_ref().and_then(StateValue::as_mood),
                    new: m,
                })
            }),
            _ => None,
        }
        .map(|payload| Event::new(STATE_SOURCE, payload).with_priority(6));

        let change = Event::new(
            STATE_SOURCE,
            EventPayload::StateChange(StateChangeData {
                key: key.to_string(),
                old_value: old.clone(),
                new_value: new.clone(),
            }),
        );
        Pending {
            ticket,
            key: key.to_string(),
            old,
            new,
            change,
            follow_up,
        }
    }

    /// Publish queued changes in order unless another caller is already doing so.
    /// Returns an error only if the change identified by `ticket` went unannounced.
    fn flush(&self, ticket: u64) -> Result<bool, StateError> {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return Ok(true);
            }
            outbox.draining = true;
        }

        let mut undelivered: Vec<(Pending, BusError)> = Vec::new();
        loop {
            let next = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(pending) => pending,
                    None => {
                        outbox.draining = false;
                        break;
                    }
                }
            };
            if let Err(e) = self.bus.publish(next.change.clone()) {
                undelivered.push((next, e));
                continue;
            }
            if let Some(follow_up) = next.follow_up {
                if let Err(e) = self.bus.publish(follow_up) {
                    warn!("State {} changed but its follow-up event was lost: {}", next.key, e);
                }
            }
        }

        if undelivered.is_empty() {
            return Ok(true);
        }
        warn!(
            "Rolling back {} unannounced state change(s)",
            undelivered.len()
        );
        let mut own_error = None;
        let mut entries = lock(&self.entries);
        for (pending, e) in undelivered.into_iter().rev() {
            if pending.ticket == ticket {
                own_error = Some(e);
            }
            if entries.get(&pending.key) == Some(&pending.new) {
                match pending.old {
                    Some(old) => {
                        entries.insert(pending.key, old);
                    }
                    None => {
                        entries.remove(&pending.key);
                    }
                }
            }
        }
        match own_error {
            Some(e) => Err(e.into()),
            None => Ok(true),
        }
    }

    /// Current value, or `None` for an unknown key.
    pub fn get(&self, key: &str) -> Option<StateValue> {
        lock(&self.entries).get(key).cloned()
    }

    /// Owned snapshot of every entry, sorted by key.
    pub fn all(&self) -> BTreeMap<String, StateValue> {
        lock(&self.entries)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Typed helpers ──

    pub fn mood(&self) -> Option<Mood> {
        self.get(KEY_MOOD).and_then(|v| v.as_mood())
    }

    pub fn energy(&self) -> Option<i64> {
        self.get(KEY_ENERGY).and_then(|v| v.as_integer())
    }

    pub fn set_mood(&self, mood: Mood) -> Result<bool, StateError> {
        self.set(KEY_MOOD, mood)
    }

    /// Add `delta` to the current energy (100 if absent), clamp, and write it through `set`.
    /// Returns the resulting energy.
    pub fn update_energy(&self, delta: i64) -> Result<i64, StateError> {
        let current = self.energy().unwrap_or(ENERGY_FALLBACK);
        let next = clamp_energy(current.saturating_add(delta));
        self.set(KEY_ENERGY, next)?;
        Ok(next)
    }

    /// Drop every entry without publishing anything.
    pub fn reset(&self) {
        lock(&self.entries).clear();
    }

    /// Seed the canonical continuum through `set`.
    pub fn initialize_defaults(&self) -> Result<(), StateError> {
        for (key, value) in default_entries() {
            self.set(key, value)?;
        }
        Ok(())
    }
}

impl Module for StateStore {
    type Config = ();
    type Error = StateError;

    fn name(&self) -> &'static str {
        STATE_SOURCE
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn init(&self, _config: &()) -> Result<(), StateError> {
        match self.lifecycle.init() {
            Transition::Applied => {
                self.initialize_defaults()?;
                info!("State store initialized with {} entries", self.len());
                Ok(())
            }
            Transition::NoOp => Ok(()),
            Transition::Refused(_) => Err(StateError::ShutDown),
        }
    }

    fn shutdown(&self) {
        if self.lifecycle.shutdown() == Transition::Applied {
            self.reset();
            info!("State store shut down");
        }
    }
}
