//! auryn-core — the runtime core of the AURYN agent, no UI.
//!
//! This crate contains the event bus, the state store holding the mood/energy continuum,
//! and the pulse scheduler that periodically maintains that state. It is completely
//! collaborator-agnostic: voice, NLP and UI code subscribe to the bus and write through
//! the store.

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod pulse;
pub mod runtime;
pub mod state;
pub mod types;

use std::any::Any;
use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked. Handlers and callbacks
/// never run while one of the core's locks is held, so the protected data stays consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
