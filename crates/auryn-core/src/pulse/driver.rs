//! Pulse drivers — the source of "a pulse is due now".
//!
//! [`IntervalDriver`] fires on the tokio wall clock; [`TickDriver`] fires only when a test
//! advances its [`TickScheduler`] clock. The scheduler's pulse algorithm is the same for both.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::SchedulerError;
use crate::lock;
use crate::pulse::tick::{TaskId, TickScheduler};

/// An ad-hoc task on a [`TickDriver`] clock. It runs with no driver lock held, so it may
/// call back into the driver or into a scheduler that owns it.
pub type DriverTask = Box<dyn FnOnce() + Send>;

/// Invoked by a driver each time a pulse is due.
pub type PulseFn = Arc<dyn Fn() + Send + Sync>;

pub trait PulseDriver: Send + Sync + 'static {
    /// Start calling `on_due` once per `period`. Any previous arming is cancelled first, so
    /// a driver never has two live timers.
    fn arm(&self, period: Duration, on_due: PulseFn) -> Result<(), SchedulerError>;

    /// Stop calling `on_due`. Idempotent.
    fn disarm(&self);

    fn is_armed(&self) -> bool;
}

// ── Wall clock ──

/// Drives pulses from a tokio interval task. Needs a running tokio runtime to arm.
pub struct IntervalDriver {
    task: Mutex<Option<JoinHandle<()>>>,
    generation: Arc<AtomicU64>,
}

impl IntervalDriver {
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for IntervalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseDriver for IntervalDriver {
    fn arm(&self, period: Duration, on_due: PulseFn) -> Result<(), SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let mut task = lock(&self.task);
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let armed_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);

        *task = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if generation.load(Ordering::SeqCst) != armed_generation {
                    break;
                }
                on_due();
            }
        }));
        debug!("Interval driver armed every {:?}", period);
        Ok(())
    }

    fn disarm(&self) {
        let mut task = lock(&self.task);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = task.take() {
            handle.abort();
            debug!("Interval driver disarmed");
        }
    }

    fn is_armed(&self) -> bool {
        lock(&self.task).is_some()
    }
}

impl Drop for IntervalDriver {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

// ── Explicit ticks ──

struct Armed {
    period_ticks: u64,
    next_due: u64,
    on_due: PulseFn,
}

/// Drives pulses from an explicit tick counter for deterministic tests and replays.
///
/// One tick stands for `resolution` of wall time; a pulse armed with period `p` fires
/// every `p / resolution` ticks (at least every tick). With the default resolution of
/// `None`, every tick is one pulse period.
pub struct TickDriver {
    clock: Mutex<TickScheduler<DriverTask>>,
    resolution: Option<Duration>,
    armed: Mutex<Option<Armed>>,
}

impl TickDriver {
    pub fn new() -> Self {
        Self {
            clock: Mutex::new(TickScheduler::default()),
            resolution: None,
            armed: Mutex::new(None),
        }
    }

    pub fn with_resolution(resolution: Duration) -> Self {
        Self {
            resolution: Some(resolution).filter(|r| !r.is_zero()),
            ..Self::new()
        }
    }

    pub fn current_tick(&self) -> u64 {
        lock(&self.clock).current_tick()
    }

    /// Schedule an ad-hoc task on the same clock the pulses follow.
    pub fn schedule(
        &self,
        at_tick: u64,
        task: impl FnOnce() + Send + 'static,
    ) -> Result<TaskId, SchedulerError> {
        lock(&self.clock).push(at_tick, Box::new(task))
    }

    pub fn cancel(&self, id: TaskId) -> bool {
        lock(&self.clock).cancel(id)
    }

    /// Advance one tick. Due tasks run first, then the pulse if one is due.
    /// Returns the number of pulses fired (0 or 1).
    pub fn tick(&self) -> usize {
        let now = lock(&self.clock).advance_clock();
        loop {
            let task = lock(&self.clock).pop_due();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        let due = {
            let mut armed = lock(&self.armed);
            match armed.as_mut() {
                Some(a) if a.next_due <= now => {
                    a.next_due = now + a.period_ticks;
                    Some(Arc::clone(&a.on_due))
                }
                _ => None,
            }
        };
        match due {
            Some(on_due) => {
                on_due();
                1
            }
            None => 0,
        }
    }

    /// `n` successive ticks. Returns the number of pulses fired.
    pub fn advance(&self, n: u64) -> usize {
        (0..n).map(|_| self.tick()).sum()
    }

    fn period_ticks(&self, period: Duration) -> u64 {
        match self.resolution {
            Some(res) => ((period.as_nanos() / res.as_nanos()) as u64).max(1),
            None => 1,
        }
    }
}

impl Default for TickDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseDriver for TickDriver {
    fn arm(&self, period: Duration, on_due: PulseFn) -> Result<(), SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        let period_ticks = self.period_ticks(period);
        let now = self.current_tick();
        *lock(&self.armed) = Some(Armed {
            period_ticks,
            next_due: now + period_ticks,
            on_due,
        });
        Ok(())
    }

    fn disarm(&self) {
        lock(&self.armed).take();
    }

    fn is_armed(&self) -> bool {
        lock(&self.armed).is_some()
    }
}
