//! Runtime — composition root that wires the bus, the state store and the pulse scheduler.
//!
//! Collaborators (voice, NLP, UI) get the shared bus and store from here, plus a few thin
//! helpers that publish the boundary events they produce.

use std::sync::Arc;

use tracing::info;

use crate::bus::EventBus;
use crate::config::Config;
use crate::error::CoreError;
use crate::events::{Event, EventPayload, MemoryUpdateData, TextData, VoiceStateData};
use crate::lifecycle::Module;
use crate::pulse::{IntervalDriver, PulseDriver, PulseScheduler};
use crate::state::StateStore;
use crate::types::KEY_LAST_INPUT;

/// Source name stamped on boundary events.
pub const RUNTIME_SOURCE: &str = "runtime";

pub struct Runtime<D: PulseDriver = IntervalDriver> {
    config: Config,
    bus: Arc<EventBus>,
    store: Arc<StateStore>,
    pulse: PulseScheduler<D>,
}

impl Runtime<IntervalDriver> {
    /// Runtime driven by the tokio wall clock.
    pub fn new(config: Config) -> Self {
        Self::with_driver(config, IntervalDriver::new())
    }
}

impl<D: PulseDriver> Runtime<D> {
    pub fn with_driver(config: Config, driver: D) -> Self {
        let bus = Arc::new(EventBus::with_capacity(config.bus.history_capacity));
        let store = Arc::new(StateStore::new(bus.clone()));
        let pulse = PulseScheduler::new(bus.clone(), store.clone(), driver);
        Self {
            config,
            bus,
            store,
            pulse,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn pulse(&self) -> &PulseScheduler<D> {
        &self.pulse
    }

    // ── Lifecycle ──

    /// Seed the state store, then prepare the pulse scheduler.
    pub fn init(&self) -> Result<(), CoreError> {
        self.store.init(&())?;
        self.pulse.init(&self.config.pulse)?;
        info!("Runtime initialized");
        Ok(())
    }

    pub fn start(&self) -> Result<(), CoreError> {
        self.pulse.start()?;
        Ok(())
    }

    pub fn stop(&self) {
        self.pulse.stop();
    }

    /// Tear down in reverse order of construction. Idempotent.
    pub fn shutdown(&self) {
        self.pulse.shutdown();
        self.bus.close();
        self.store.shutdown();
        info!("Runtime shut down");
    }

    // ── Boundary helpers ──

    /// Remember the latest user input and announce it.
    pub fn record_input(&self, text: &str) -> Result<(), CoreError> {
        self.store.set(KEY_LAST_INPUT, text)?;
        self.publish(EventPayload::InputReceived(TextData { text: text.into() }))
    }

    pub fn record_output(&self, text: &str) -> Result<(), CoreError> {
        self.publish(EventPayload::OutputGenerated(TextData { text: text.into() }))
    }

    pub fn voice_state(&self, state: &str) -> Result<(), CoreError> {
        self.publish(EventPayload::VoiceStateChange(VoiceStateData {
            state: state.into(),
        }))
    }

    pub fn memory_update(
        &self,
        key: &str,
        detail: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.publish(EventPayload::MemoryUpdate(MemoryUpdateData {
            key: key.into(),
            detail,
        }))
    }

    /// Attach the emotion collaborator's intensity reading to emotional pulses.
    pub fn set_intensity_source<F>(&self, source: F)
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.pulse.set_intensity_source(source);
    }

    fn publish(&self, payload: EventPayload) -> Result<(), CoreError> {
        self.bus.publish(Event::new(RUNTIME_SOURCE, payload))?;
        Ok(())
    }
}
