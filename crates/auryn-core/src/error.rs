//! Error types for the runtime core.
//!
//! Each component has its own enum; [`CoreError`] aggregates them for callers that
//! drive the whole runtime.

use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Errors raised by the event bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `publish` or `subscribe` after `close()`.
    #[error("event bus is closed")]
    Closed,

    /// The handle was minted by a different bus instance.
    #[error("subscription {subscription} does not belong to this bus")]
    ForeignSubscription { subscription: u64 },
}

/// Errors raised by the state store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("state store is not initialized")]
    NotInitialized,

    #[error("state store has been shut down")]
    ShutDown,

    #[error("'{value}' is not a known mood")]
    UnknownMood { value: String },

    #[error("key '{key}' does not accept {kind} values")]
    InvalidValue { key: String, kind: &'static str },

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Errors raised by the pulse scheduler and its drivers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("pulse scheduler is not initialized")]
    NotInitialized,

    #[error("pulse scheduler has been shut down")]
    ShutDown,

    #[error("pulse scheduler is not ready (state: {0})")]
    NotReady(LifecycleState),

    #[error("a pulse is already in progress")]
    PulseInProgress,

    #[error("cannot schedule at tick {at_tick}: current tick is {current_tick}")]
    ScheduleInPast { at_tick: u64, current_tick: u64 },

    #[error("interval driver needs a running tokio runtime")]
    NoRuntime,

    #[error("pulse interval must be greater than zero")]
    ZeroInterval,

    #[error("pulse cadences must be greater than zero")]
    ZeroCadence,

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Any error the runtime core can produce.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
