//! Deterministic tick scheduler — tasks run against an explicit integer clock that only
//! moves when `tick()`/`advance(n)` is called. No wall clock is involved.

use std::collections::BTreeMap;

use crate::error::SchedulerError;

/// A one-shot task. It receives the scheduler so it can schedule follow-up work.
pub type TickTask = Box<dyn TickFn>;

/// Named bound for [`TickTask`] closures; a plain `dyn FnOnce(&mut TickScheduler)` alias
/// would be self-referential through `TickScheduler`'s default type parameter.
pub trait TickFn: Send {
    fn run(self: Box<Self>, sched: &mut TickScheduler);
}

impl<F: FnOnce(&mut TickScheduler) + Send> TickFn for F {
    fn run(self: Box<Self>, sched: &mut TickScheduler) {
        (*self)(sched)
    }
}

impl TickFn for TickTask {
    fn run(self: Box<Self>, sched: &mut TickScheduler) {
        (*self).run(sched)
    }
}

/// Identifies a scheduled task for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    at_tick: u64,
    seq: u64,
}

impl TaskId {
    pub fn at_tick(&self) -> u64 {
        self.at_tick
    }
}

/// Ordered, at-most-once execution of due tasks. Tasks due on the same tick run in the
/// order they were scheduled.
///
/// The queue is generic over the task type so a caller that must not hold the scheduler
/// while a task runs can pop due tasks one at a time with `pop_due`.
pub struct TickScheduler<T = TickTask> {
    current_tick: u64,
    next_seq: u64,
    fired: u64,
    queue: BTreeMap<(u64, u64), T>,
}

impl<T> Default for TickScheduler<T> {
    fn default() -> Self {
        Self {
            current_tick: 0,
            next_seq: 0,
            fired: 0,
            queue: BTreeMap::new(),
        }
    }
}

impl<T> TickScheduler<T> {
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Total tasks run since creation or the last `reset`.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(tick, _)| *tick)
    }

    /// Queue `task` at `at_tick`. Ticks before the current one are rejected.
    pub fn push(&mut self, at_tick: u64, task: T) -> Result<TaskId, SchedulerError> {
        if at_tick < self.current_tick {
            return Err(SchedulerError::ScheduleInPast {
                at_tick,
                current_tick: self.current_tick,
            });
        }
        Ok(self.insert(at_tick, task))
    }

    /// Queue `task` `delay` ticks from now.
    pub fn push_in(&mut self, delay: u64, task: T) -> TaskId {
        let at_tick = self.current_tick.saturating_add(delay);
        self.insert(at_tick, task)
    }

    fn insert(&mut self, at_tick: u64, task: T) -> TaskId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((at_tick, seq), task);
        TaskId { at_tick, seq }
    }

    /// Returns false if the task already ran or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.queue.remove(&(id.at_tick, id.seq)).is_some()
    }

    /// Move the clock forward by one without running anything. Returns the new tick.
    pub fn advance_clock(&mut self) -> u64 {
        self.current_tick += 1;
        self.current_tick
    }

    /// Remove and return the earliest task due at or before the current tick, counting
    /// it as fired.
    pub fn pop_due(&mut self) -> Option<T> {
        let key = match self.queue.keys().next() {
            Some(&key) if key.0 <= self.current_tick => key,
            _ => return None,
        };
        let task = self.queue.remove(&key)?;
        self.fired += 1;
        Some(task)
    }

    /// Back to tick zero with an empty queue.
    pub fn reset(&mut self) {
        self.current_tick = 0;
        self.fired = 0;
        self.queue.clear();
    }
}

impl TickScheduler<TickTask> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run at `at_tick`. Ticks before the current one are rejected.
    /// A task scheduled for the current tick runs during the drain in progress, or on the
    /// next `tick()` if none is.
    pub fn schedule(
        &mut self,
        at_tick: u64,
        task: impl TickFn + 'static,
    ) -> Result<TaskId, SchedulerError> {
        self.push(at_tick, Box::new(task))
    }

    /// Schedule `task` `delay` ticks from now.
    pub fn schedule_in(
        &mut self,
        delay: u64,
        task: impl TickFn + 'static,
    ) -> TaskId {
        self.push_in(delay, Box::new(task))
    }

    /// Move the clock forward by one and run every task now due. Returns how many ran.
    pub fn tick(&mut self) -> usize {
        self.advance_clock();
        self.drain()
    }

    /// `n` successive ticks. Returns how many tasks ran in total.
    pub fn advance(&mut self, n: u64) -> usize {
        (0..n).map(|_| self.tick()).sum()
    }

    fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due() {
            task.run(self);
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<(String, u64)>>>, impl Fn(&str) -> TickTask) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let for_make = log.clone();
        let make = move |tag: &str| -> TickTask {
            let log = for_make.clone();
            let tag = tag.to_string();
            Box::new(move |s: &mut TickScheduler| {
                log.lock().unwrap().push((tag, s.current_tick()));
            })
        };
        (log, make)
    }

    #[test]
    fn test_task_fires_once_at_its_tick() {
        let mut sched = TickScheduler::new();
        let (log, make) = recorder();
        sched.schedule(5, make("a")).unwrap();

        assert_eq!(sched.advance(4), 0);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(sched.tick(), 1);
        assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), 5)]);

        assert_eq!(sched.advance(10), 0);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(sched.fired(), 1);
    }

    #[test]
    fn test_advance_five_fires_at_five() {
        let mut sched = TickScheduler::new();
        let (log, make) = recorder();
        sched.schedule(5, make("a")).unwrap();
        assert_eq!(sched.advance(5), 1);
        assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), 5)]);
    }

    #[test]
    fn test_schedule_in_past_is_rejected() {
        let mut sched = TickScheduler::new();
        sched.advance(3);
        let (_log, make) = recorder();
        let err = sched.schedule(sched.current_tick() - 1, make("late")).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::ScheduleInPast {
                at_tick: 2,
                current_tick: 3
            }
        );
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_same_tick_runs_in_schedule_order() {
        let mut sched = TickScheduler::new();
        let (log, make) = recorder();
        sched.schedule(2, make("second-tick")).unwrap();
        sched.schedule(1, make("x")).unwrap();
        sched.schedule(1, make("y")).unwrap();
        sched.advance(2);
        let tags: Vec<String> = log.lock().unwrap().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(tags, vec!["x", "y", "second-tick"]);
    }

    #[test]
    fn test_task_can_reschedule_itself() {
        let mut sched = TickScheduler::new();
        let count = Arc::new(Mutex::new(0));

        fn every_other(count: Arc<Mutex<u32>>) -> TickTask {
            Box::new(move |s: &mut TickScheduler| {
                *count.lock().unwrap() += 1;
                s.schedule_in(2, every_other(count));
            })
        }
        sched.schedule(2, every_other(count.clone())).unwrap();
        sched.advance(10);
        assert_eq!(*count.lock().unwrap(), 5);
        assert_eq!(sched.pending(), 1);
    }

    #[test]
    fn test_current_tick_task_runs_in_same_drain() {
        let mut sched = TickScheduler::new();
        let (log, make) = recorder();
        let chained = make("chained");
        sched
            .schedule(1, move |s: &mut TickScheduler| {
                let now = s.current_tick();
                s.schedule(now, chained).unwrap();
            })
            .unwrap();
        assert_eq!(sched.tick(), 2);
        assert_eq!(*log.lock().unwrap(), vec![("chained".to_string(), 1)]);
    }

    #[test]
    fn test_cancel_and_reset() {
        let mut sched = TickScheduler::new();
        let (log, make) = recorder();
        let id = sched.schedule(3, make("a")).unwrap();
        sched.schedule(4, make("b")).unwrap();
        assert!(sched.cancel(id));
        assert!(!sched.cancel(id));
        assert_eq!(sched.next_due(), Some(4));
        sched.advance(4);
        assert_eq!(*log.lock().unwrap(), vec![("b".to_string(), 4)]);

        sched.reset();
        assert_eq!(sched.current_tick(), 0);
        assert_eq!(sched.pending(), 0);
        assert_eq!(sched.fired(), 0);
    }

    #[test]
    fn test_pop_due_hands_out_tasks_in_order() {
        let mut queue: TickScheduler<&'static str> = TickScheduler::default();
        queue.push(2, "b").unwrap();
        queue.push(1, "a").unwrap();
        queue.push_in(3, "c");
        assert_eq!(queue.pop_due(), None);

        assert_eq!(queue.advance_clock(), 1);
        assert_eq!(queue.pop_due(), Some("a"));
        assert_eq!(queue.pop_due(), None);

        queue.advance_clock();
        queue.advance_clock();
        assert_eq!(queue.pop_due(), Some("b"));
        assert_eq!(queue.pop_due(), Some("c"));
        assert_eq!(queue.pop_due(), None);
        assert_eq!(queue.fired(), 3);
    }
}
