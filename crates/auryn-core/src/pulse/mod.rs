//! The pulse loop — periodic, low-frequency maintenance of the continuum.
//!
//! Each pulse, in order:
//! 1. bumps the pulse counter,
//! 2. regenerates energy by the configured step (default energy 70 if absent),
//! 3. reverts sad/irritated/low_energy moods to calm on every `stabilization_cadence`th pulse,
//! 4. runs the registered pulse callbacks in registration order,
//! 5. publishes a `RuntimePulse`,
//! 6. publishes an `EmotionalPulse` on every `emotional_pulse_cadence`th pulse.
//!
//! The same algorithm runs whether pulses come from the wall clock ([`IntervalDriver`]) or
//! from explicit ticks ([`TickDriver`]).

pub mod driver;
pub mod tick;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::config::PulseConfig;
use crate::error::SchedulerError;
use crate::events::{EmotionalPulseData, Event, EventPayload, PulsePhase, RuntimePulseData};
use crate::lifecycle::{Lifecycle, LifecycleState, Module, Transition};
use crate::state::StateStore;
use crate::types::{clamp_energy, Mood, KEY_ENERGY};
use crate::{lock, panic_message};

pub use driver::{DriverTask, IntervalDriver, PulseDriver, PulseFn, TickDriver};
pub use tick::{TaskId, TickFn, TickScheduler, TickTask};

/// Source name stamped on events the scheduler publishes.
pub const PULSE_SOURCE: &str = "pulse_scheduler";

/// What a pulse callback sees: the continuum after energy and mood maintenance.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseContext {
    pub pulse_count: u64,
    pub mood: Option<Mood>,
    pub energy: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Summary of one pulse, returned by [`PulseScheduler::pulse`].
#[derive(Debug, Clone, PartialEq)]
pub struct PulseReport {
    pub pulse_count: u64,
    pub mood: Option<Mood>,
    pub energy: Option<i64>,
    pub stabilized: bool,
    pub emotional_pulse: bool,
    pub callback_failures: usize,
}

pub type PulseCallback = dyn Fn(&PulseContext) -> anyhow::Result<()> + Send + Sync;

/// Supplies the opaque emotional intensity carried by `EmotionalPulse` events.
pub type IntensityFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Removal token returned by `on_pulse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PulseHandle(u64);

struct Core {
    bus: Arc<EventBus>,
    store: Arc<StateStore>,
    config: Mutex<PulseConfig>,
    lifecycle: Lifecycle,
    pulse_count: AtomicU64,
    next_callback: AtomicU64,
    callbacks: Mutex<Vec<(u64, Arc<PulseCallback>)>>,
    intensity: Mutex<Option<IntensityFn>>,
    in_pulse: Mutex<()>,
}

impl Core {
    fn not_ready(&self, state: LifecycleState) -> SchedulerError {
        match state {
            LifecycleState::Shutdown => SchedulerError::ShutDown,
            LifecycleState::Stopped if !self.lifecycle.was_initialized() => {
                SchedulerError::NotInitialized
            }
            other => SchedulerError::NotReady(other),
        }
    }

    /// Run one pulse. Driver pulses only start while running; manual pulses also run
    /// while initialized.
    fn run_pulse(&self, manual: bool) -> Result<PulseReport, SchedulerError> {
        let _serial = match self.in_pulse.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(SchedulerError::PulseInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let allowed: fn(LifecycleState) -> bool = if manual {
            |s| s.is_ready()
        } else {
            |s| s == LifecycleState::Running
        };
        let pulse_count = self
            .lifecycle
            .run_if(allowed, || self.pulse_count.fetch_add(1, Ordering::SeqCst) + 1)
            .map_err(|state| self.not_ready(state))?;

        let config = lock(&self.config).clone();

        let energy = self.store.energy().unwrap_or(config.default_energy);
        self.store.set(
            KEY_ENERGY,
            clamp_energy(energy.saturating_add(config.energy_regen_step)),
        )?;

        let mut stabilized = false;
        if let Some(mood) = self.store.mood() {
            if mood.needs_stabilization() && pulse_count % config.stabilization_cadence == 0 {
                stabilized = self.store.set_mood(Mood::Calm)?;
                debug!("Pulse {}: mood {} stabilized to calm", pulse_count, mood);
            }
        }

        let ctx = PulseContext {
            pulse_count,
            mood: self.store.mood(),
            energy: self.store.energy(),
            timestamp: Utc::now(),
        };

        let callbacks = lock(&self.callbacks).clone();
        let mut callback_failures = 0;
        for (id, callback) in callbacks {
            let message = match catch_unwind(AssertUnwindSafe(|| callback(&ctx))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("callback panicked: {}", panic_message(payload.as_ref())),
            };
            callback_failures += 1;
            warn!("Pulse callback {} failed: {}", id, message);
            self.bus.publish(Event::error(
                PULSE_SOURCE,
                format!("pulse_callback_{}", id),
                message,
                None,
            ))?;
        }

        let mood = self.store.mood();
        let energy = self.store.energy();
        self.bus.publish(Event::new(
            PULSE_SOURCE,
            EventPayload::RuntimePulse(RuntimePulseData {
                pulse_count,
                phase: PulsePhase::Tick,
                mood,
                energy,
            }),
        ))?;

        let emotional_pulse = pulse_count % config.emotional_pulse_cadence == 0;
        if emotional_pulse {
            let source = lock(&self.intensity).clone();
            let intensity = source.map(|f| f()).unwrap_or(config.default_intensity);
            self.bus.publish(
                Event::new(
                    PULSE_SOURCE,
                    EventPayload::EmotionalPulse(EmotionalPulseData {
                        pulse_count,
                        mood,
                        energy,
                        intensity,
                    }),
                )
                .with_priority(6),
            )?;
        }

        debug!(
            "Pulse {} (mood: {:?}, energy: {:?})",
            pulse_count, mood, energy
        );
        Ok(PulseReport {
            pulse_count,
            mood,
            energy,
            stabilized,
            emotional_pulse,
            callback_failures,
        })
    }
}

/// The LWM loop. Owns its driver; shares the bus and store with the rest of the runtime.
pub struct PulseScheduler<D: PulseDriver = IntervalDriver> {
    core: Arc<Core>,
    driver: D,
}

impl<D: PulseDriver> PulseScheduler<D> {
    pub fn new(bus: Arc<EventBus>, store: Arc<StateStore>, driver: D) -> Self {
        Self {
            core: Arc::new(Core {
                bus,
                store,
                config: Mutex::new(PulseConfig::default()),
                lifecycle: Lifecycle::new(),
                pulse_count: AtomicU64::new(0),
                next_callback: AtomicU64::new(1),
                callbacks: Mutex::new(Vec::new()),
                intensity: Mutex::new(None),
                in_pulse: Mutex::new(()),
            }),
            driver,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> PulseConfig {
        lock(&self.core.config).clone()
    }

    pub fn is_running(&self) -> bool {
        self.core.lifecycle.state() == LifecycleState::Running
    }

    pub fn pulse_count(&self) -> u64 {
        self.core.pulse_count.load(Ordering::SeqCst)
    }

    /// Zero the pulse counter. Meant for deterministic runs.
    pub fn reset_counter(&self) {
        self.core.pulse_count.store(0, Ordering::SeqCst);
    }

    // ── Running ──

    /// Begin firing pulses at the configured interval. No-op while already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        match self.core.lifecycle.start() {
            Transition::NoOp => return Ok(()),
            Transition::Refused(state) => return Err(self.core.not_ready(state)),
            Transition::Applied => {}
        }

        let interval = lock(&self.core.config).interval();
        let weak: Weak<Core> = Arc::downgrade(&self.core);
        let on_due: PulseFn = Arc::new(move || {
            let Some(core) = weak.upgrade() else {
                return;
            };
            match core.run_pulse(false) {
                Ok(_) | Err(SchedulerError::NotReady(_)) => {}
                Err(e) => warn!("Scheduled pulse failed: {}", e),
            }
        });

        if let Err(e) = self.driver.arm(interval, on_due) {
            error!("Failed to arm pulse driver: {}", e);
            self.core.lifecycle.fail();
            return Err(e);
        }
        info!("Pulse scheduler running every {:?}", interval);
        Ok(())
    }

    /// Cancel the driver and publish a final `RuntimePulse` with the total pulse count.
    /// No new pulse starts after this returns; one already in progress may finish.
    pub fn stop(&self) {
        if self.core.lifecycle.stop() != Transition::Applied {
            return;
        }
        self.driver.disarm();

        let total = self.pulse_count();
        let summary = Event::new(
            PULSE_SOURCE,
            EventPayload::RuntimePulse(RuntimePulseData {
                pulse_count: total,
                phase: PulsePhase::Stopped,
                mood: self.core.store.mood(),
                energy: self.core.store.energy(),
            }),
        );
        if let Err(e) = self.core.bus.publish(summary) {
            warn!("Could not publish stop summary: {}", e);
        }
        info!("Pulse scheduler stopped after {} pulses", total);
    }

    /// Run one pulse now, outside the driver. Allowed while initialized or running.
    pub fn pulse(&self) -> Result<PulseReport, SchedulerError> {
        self.core.run_pulse(true)
    }

    // ── Callbacks ──

    /// Register a per-pulse callback. Registering the same `Arc` again returns the
    /// existing handle.
    pub fn on_pulse(&self, callback: Arc<PulseCallback>) -> PulseHandle {
        let mut callbacks = lock(&self.core.callbacks);
        let wanted = Arc::as_ptr(&callback) as *const ();
        if let Some((id, _)) = callbacks
            .iter()
            .find(|(_, existing)| Arc::as_ptr(existing) as *const () == wanted)
        {
            return PulseHandle(*id);
        }
        let id = self.core.next_callback.fetch_add(1, Ordering::SeqCst);
        callbacks.push((id, callback));
        PulseHandle(id)
    }

    pub fn on_pulse_fn<F>(&self, callback: F) -> PulseHandle
    where
        F: Fn(&PulseContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_pulse(Arc::new(callback))
    }

    /// Returns false if the handle was already removed.
    pub fn remove_pulse_callback(&self, handle: &PulseHandle) -> bool {
        let mut callbacks = lock(&self.core.callbacks);
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != handle.0);
        callbacks.len() != before
    }

    pub fn callback_count(&self) -> usize {
        lock(&self.core.callbacks).len()
    }

    /// Attach the emotion collaborator's intensity reading.
    pub fn set_intensity_source<F>(&self, source: F)
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        *lock(&self.core.intensity) = Some(Arc::new(source));
    }

    pub fn clear_intensity_source(&self) {
        lock(&self.core.intensity).take();
    }
}

impl<D: PulseDriver> Module for PulseScheduler<D> {
    type Config = PulseConfig;
    type Error = SchedulerError;

    fn name(&self) -> &'static str {
        PULSE_SOURCE
    }

    fn state(&self) -> LifecycleState {
        self.core.lifecycle.state()
    }

    fn init(&self, config: &PulseConfig) -> Result<(), SchedulerError> {
        if config.interval_ms == 0 {
            return Err(SchedulerError::ZeroInterval);
        }
        if config.stabilization_cadence == 0 || config.emotional_pulse_cadence == 0 {
            return Err(SchedulerError::ZeroCadence);
        }
        match self.core.lifecycle.init() {
            Transition::Applied => {
                *lock(&self.core.config) = config.clone();
                info!("Pulse scheduler initialized");
                Ok(())
            }
            Transition::NoOp => Ok(()),
            Transition::Refused(_) => Err(SchedulerError::ShutDown),
        }
    }

    fn shutdown(&self) {
        self.stop();
        if self.core.lifecycle.shutdown() == Transition::Applied {
            self.driver.disarm();
            lock(&self.core.callbacks).clear();
            lock(&self.core.intensity).take();
            info!("Pulse scheduler shut down");
        }
    }
}

impl<D: PulseDriver> Drop for PulseScheduler<D> {
    fn drop(&mut self) {
        self.driver.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use crate::types::KEY_MOOD;
    use std::time::Duration;

    struct Fixture {
        bus: Arc<EventBus>,
        store: Arc<StateStore>,
        pulse: PulseScheduler<TickDriver>,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(bus.clone()));
        store.init(&()).unwrap();
        let pulse = PulseScheduler::new(bus.clone(), store.clone(), TickDriver::new());
        pulse.init(&PulseConfig::default()).unwrap();
        bus.clear_history();
        Fixture { bus, store, pulse }
    }

    #[test]
    fn test_pulse_before_init_fails() {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(bus.clone()));
        let pulse = PulseScheduler::new(bus, store, TickDriver::new());
        assert_eq!(pulse.pulse(), Err(SchedulerError::NotInitialized));
        assert_eq!(pulse.start(), Err(SchedulerError::NotInitialized));
        assert_eq!(pulse.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_energy_regenerates_and_clamps() {
        let f = fixture();
        f.store.set(KEY_ENERGY, 98).unwrap();
        f.pulse.pulse().unwrap();
        f.pulse.pulse().unwrap();
        let report = f.pulse.pulse().unwrap();
        assert_eq!(report.energy, Some(100));
        assert_eq!(f.store.energy(), Some(100));
    }

    #[test]
    fn test_energy_defaults_to_seventy_when_absent() {
        let f = fixture();
        f.store.reset();
        let report = f.pulse.pulse().unwrap();
        assert_eq!(report.energy, Some(71));
    }

    #[test]
    fn test_mood_stabilizes_on_cadence() {
        let f = fixture();
        f.store.set(KEY_MOOD, "sad").unwrap();
        f.bus.clear_history();

        f.pulse.start().unwrap();
        assert_eq!(f.pulse.driver().advance(2), 2);
        assert_eq!(f.store.mood(), Some(Mood::Sad));
        assert_eq!(f.pulse.driver().advance(1), 1);
        assert_eq!(f.store.mood(), Some(Mood::Calm));
        assert_eq!(f.bus.events_by_type(EventType::MoodChange).len(), 1);

        f.store.set_mood(Mood::Irritated).unwrap();
        let stabilized: Vec<bool> = (0..3)
            .map(|_| f.pulse.pulse().unwrap().stabilized)
            .collect();
        assert_eq!(stabilized, vec![false, false, true]);
        assert_eq!(f.store.mood(), Some(Mood::Calm));
    }

    #[test]
    fn test_positive_mood_is_left_alone() {
        let f = fixture();
        f.store.set_mood(Mood::Happy).unwrap();
        for _ in 0..6 {
            f.pulse.pulse().unwrap();
        }
        assert_eq!(f.store.mood(), Some(Mood::Happy));
    }

    #[test]
    fn test_runtime_and_emotional_pulse_events() {
        let f = fixture();
        f.pulse.set_intensity_source(|| 0.9);
        for _ in 0..6 {
            f.pulse.pulse().unwrap();
        }
        assert_eq!(f.bus.events_by_type(EventType::RuntimePulse).len(), 6);
        let emotional = f.bus.events_by_type(EventType::EmotionalPulse);
        let counts: Vec<u64> = emotional
            .iter()
            .map(|e| match e.payload() {
                EventPayload::EmotionalPulse(d) => {
                    assert_eq!(d.intensity, 0.9);
                    d.pulse_count
                }
                other => panic!("unexpected payload {:?}", other),
            })
            .collect();
        assert_eq!(counts, vec![3, 6]);
    }

    #[test]
    fn test_default_intensity_without_source() {
        let f = fixture();
        f.pulse.pulse().unwrap();
        f.pulse.pulse().unwrap();
        let report = f.pulse.pulse().unwrap();
        assert!(report.emotional_pulse);
        match f.bus.events_by_type(EventType::EmotionalPulse)[0].payload() {
            EventPayload::EmotionalPulse(d) => assert_eq!(d.intensity, 0.5),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_callbacks_run_in_order_and_failures_are_isolated() {
        let f = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s1 = seen.clone();
        f.pulse.on_pulse_fn(move |ctx: &PulseContext| {
            s1.lock().unwrap().push(format!("first:{}", ctx.pulse_count));
            Ok(())
        });
        f.pulse
            .on_pulse_fn(|_: &PulseContext| -> anyhow::Result<()> { anyhow::bail!("tts offline") });
        f.pulse
            .on_pulse_fn(|_: &PulseContext| -> anyhow::Result<()> { panic!("ui crashed") });
        let s2 = seen.clone();
        f.pulse.on_pulse_fn(move |ctx: &PulseContext| {
            s2.lock().unwrap().push(format!("last:{}", ctx.pulse_count));
            Ok(())
        });

        let report = f.pulse.pulse().unwrap();
        assert_eq!(report.callback_failures, 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first:1", "last:1"]);
        assert_eq!(f.bus.events_by_type(EventType::Error).len(), 2);
        // the tick still completed
        assert_eq!(f.bus.events_by_type(EventType::RuntimePulse).len(), 1);
    }

    #[test]
    fn test_callback_dedup_and_removal() {
        let f = fixture();
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        let callback: Arc<PulseCallback> = Arc::new(move |_: &PulseContext| -> anyhow::Result<()> {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let first = f.pulse.on_pulse(callback.clone());
        let second = f.pulse.on_pulse(callback);
        assert_eq!(first, second);
        assert_eq!(f.pulse.callback_count(), 1);

        f.pulse.pulse().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(f.pulse.remove_pulse_callback(&first));
        assert!(!f.pulse.remove_pulse_callback(&first));
        f.pulse.pulse().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_is_idempotent_and_stop_publishes_summary() {
        let f = fixture();
        f.pulse.start().unwrap();
        f.pulse.start().unwrap();
        assert!(f.pulse.is_running());
        assert_eq!(f.pulse.driver().advance(4), 4);
        assert_eq!(f.pulse.pulse_count(), 4);

        f.pulse.stop();
        f.pulse.stop();
        assert_eq!(f.pulse.state(), LifecycleState::Stopped);
        assert_eq!(f.pulse.driver().advance(4), 0);
        assert_eq!(f.pulse.pulse_count(), 4);

        let stops: Vec<u64> = f
            .bus
            .events_by_type(EventType::RuntimePulse)
            .iter()
            .filter_map(|e| match e.payload() {
                EventPayload::RuntimePulse(d) if d.phase == PulsePhase::Stopped => {
                    Some(d.pulse_count)
                }
                _ => None,
            })
            .collect();
        assert_eq!(stops, vec![4]);

        f.pulse.start().unwrap();
        assert_eq!(f.pulse.driver().advance(2), 2);
        assert_eq!(f.pulse.pulse_count(), 6);
    }

    #[test]
    fn test_manual_pulse_while_stopped_is_refused() {
        let f = fixture();
        f.pulse.start().unwrap();
        f.pulse.stop();
        assert_eq!(
            f.pulse.pulse(),
            Err(SchedulerError::NotReady(LifecycleState::Stopped))
        );
    }

    #[test]
    fn test_stop_from_callback_prevents_next_pulse() {
        let f = Arc::new(fixture());
        let weak = Arc::downgrade(&f);
        f.pulse.on_pulse_fn(move |ctx: &PulseContext| {
            if ctx.pulse_count == 2 {
                if let Some(f) = weak.upgrade() {
                    f.pulse.stop();
                }
            }
            Ok(())
        });
        f.pulse.start().unwrap();
        f.pulse.driver().advance(5);
        assert_eq!(f.pulse.pulse_count(), 2);
        assert!(!f.pulse.is_running());
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let f = fixture();
        f.pulse.on_pulse_fn(|_: &PulseContext| Ok(()));
        f.pulse.start().unwrap();
        f.pulse.shutdown();
        f.pulse.shutdown();
        assert_eq!(f.pulse.state(), LifecycleState::Shutdown);
        assert_eq!(f.pulse.callback_count(), 0);
        assert!(!f.pulse.driver().is_armed());
        assert_eq!(f.pulse.start(), Err(SchedulerError::ShutDown));
        assert_eq!(f.pulse.init(&PulseConfig::default()), Err(SchedulerError::ShutDown));
        assert_eq!(f.pulse.pulse(), Err(SchedulerError::ShutDown));
    }

    #[test]
    fn test_reset_counter_realigns_cadence() {
        let f = fixture();
        f.pulse.pulse().unwrap();
        f.pulse.pulse().unwrap();
        f.pulse.reset_counter();
        assert_eq!(f.pulse.pulse().unwrap().pulse_count, 1);
    }

    #[test]
    fn test_init_rejects_zero_interval() {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(bus.clone()));
        let pulse = PulseScheduler::new(bus, store, TickDriver::new());
        let config = PulseConfig {
            interval_ms: 0,
            ..PulseConfig::default()
        };
        assert_eq!(pulse.init(&config), Err(SchedulerError::ZeroInterval));
    }

    #[test]
    fn test_init_rejects_zero_cadence() {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(bus.clone()));
        let pulse = PulseScheduler::new(bus, store, TickDriver::new());
        let stabilization = PulseConfig {
            stabilization_cadence: 0,
            ..PulseConfig::default()
        };
        let emotional = PulseConfig {
            emotional_pulse_cadence: 0,
            ..PulseConfig::default()
        };
        assert_eq!(pulse.init(&stabilization), Err(SchedulerError::ZeroCadence));
        assert_eq!(pulse.init(&emotional), Err(SchedulerError::ZeroCadence));
        assert_eq!(pulse.state(), LifecycleState::Stopped);
        assert!(stabilization.validate().is_err());
    }

    #[test]
    fn test_scheduled_task_can_start_the_scheduler() {
        let f = Arc::new(fixture());
        let weak = Arc::downgrade(&f);
        f.pulse
            .driver()
            .schedule(2, move || {
                if let Some(f) = weak.upgrade() {
                    f.pulse.start().unwrap();
                }
            })
            .unwrap();

        assert_eq!(f.pulse.driver().advance(2), 0);
        assert!(f.pulse.is_running());
        assert_eq!(f.pulse.driver().advance(1), 1);
        assert_eq!(f.pulse.pulse_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_single_timer_and_resume() {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(bus.clone()));
        store.init(&()).unwrap();
        let pulse = PulseScheduler::new(bus.clone(), store.clone(), IntervalDriver::new());
        pulse.init(&PulseConfig::default()).unwrap();

        pulse.start().unwrap();
        pulse.start().unwrap();
        tokio::time::sleep(Duration::from_millis(15_100)).await;
        assert_eq!(pulse.pulse_count(), 3);

        pulse.stop();
        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(pulse.pulse_count(), 3);

        pulse.start().unwrap();
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(pulse.pulse_count(), 4);
        pulse.shutdown();
    }
}
