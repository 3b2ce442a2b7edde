//! Module lifecycle — the `stopped → initialized → running → shutdown` state machine shared
//! by every schedulable component.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Stopped,
    Initialized,
    Running,
    Shutdown,
    Error,
}

impl LifecycleState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LifecycleState::Initialized | LifecycleState::Running)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Initialized => write!(f, "initialized"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Shutdown => write!(f, "shutdown"),
            LifecycleState::Error => write!(f, "error"),
        }
    }
}

/// Contract implemented by every schedulable component.
///
/// `init` is idempotent while the module is initialized or running, and `shutdown` is
/// idempotent and reachable from any state. Operations other than `init` and the status
/// queries fail with a "not initialized" error until `init` has succeeded.
pub trait Module {
    type Config;
    type Error;

    fn name(&self) -> &'static str;

    fn state(&self) -> LifecycleState;

    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    fn init(&self, config: &Self::Config) -> Result<(), Self::Error>;

    fn shutdown(&self);
}

/// Outcome of a requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Applied,
    NoOp,
    Refused(LifecycleState),
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    initialized_once: bool,
}

/// Thread-safe holder for a component's lifecycle state.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    inner: Mutex<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LifecycleState::Stopped,
                initialized_once: false,
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        lock(&self.inner).state
    }

    /// True once `init` has succeeded, even if the module was stopped afterwards.
    pub fn was_initialized(&self) -> bool {
        lock(&self.inner).initialized_once
    }

    pub fn init(&self) -> Transition {
        let mut inner = lock(&self.inner);
        match inner.state {
            LifecycleState::Initialized | LifecycleState::Running => Transition::NoOp,
            LifecycleState::Shutdown => Transition::Refused(LifecycleState::Shutdown),
            LifecycleState::Stopped | LifecycleState::Error => {
                inner.state = LifecycleState::Initialized;
                inner.initialized_once = true;
                Transition::Applied
            }
        }
    }

    pub fn start(&self) -> Transition {
        let mut inner = lock(&self.inner);
        match inner.state {
            LifecycleState::Running => Transition::NoOp,
            LifecycleState::Initialized => {
                inner.state = LifecycleState::Running;
                Transition::Applied
            }
            LifecycleState::Stopped if inner.initialized_once => {
                inner.state = LifecycleState::Running;
                Transition::Applied
            }
            other => Transition::Refused(other),
        }
    }

    pub fn stop(&self) -> Transition {
        let mut inner = lock(&self.inner);
        match inner.state {
            LifecycleState::Running => {
                inner.state = LifecycleState::Stopped;
                Transition::Applied
            }
            _ => Transition::NoOp,
        }
    }

    pub fn shutdown(&self) -> Transition {
        let mut inner = lock(&self.inner);
        if inner.state == LifecycleState::Shutdown {
            return Transition::NoOp;
        }
        inner.state = LifecycleState::Shutdown;
        Transition::Applied
    }

    /// Move to `error` unless already shut down.
    pub fn fail(&self) {
        let mut inner = lock(&self.inner);
        if inner.state != LifecycleState::Shutdown {
            inner.state = LifecycleState::Error;
        }
    }

    /// Run `f` with the lifecycle lock held, but only if `allowed` accepts the current state.
    /// Used as a gate so that a transition cannot interleave with `f`.
    pub fn run_if<R>(
        &self,
        allowed: impl Fn(LifecycleState) -> bool,
        f: impl FnOnce() -> R,
    ) -> Result<R, LifecycleState> {
        let inner = lock(&self.inner);
        if allowed(inner.state) {
            Ok(f())
        } else {
            Err(inner.state)
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Stopped);
        assert_eq!(lc.init(), Transition::Applied);
        assert_eq!(lc.init(), Transition::NoOp);
        assert_eq!(lc.state(), LifecycleState::Initialized);
        assert!(lc.state().is_ready());
    }

    #[test]
    fn test_start_requires_init() {
        let lc = Lifecycle::new();
        assert_eq!(lc.start(), Transition::Refused(LifecycleState::Stopped));
        lc.init();
        assert_eq!(lc.start(), Transition::Applied);
        assert_eq!(lc.start(), Transition::NoOp);
    }

    #[test]
    fn test_stop_then_start_resumes() {
        let lc = Lifecycle::new();
        lc.init();
        lc.start();
        assert_eq!(lc.stop(), Transition::Applied);
        assert_eq!(lc.stop(), Transition::NoOp);
        assert!(!lc.state().is_ready());
        assert_eq!(lc.start(), Transition::Applied);
        assert_eq!(lc.state(), LifecycleState::Running);
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let lc = Lifecycle::new();
        lc.init();
        assert_eq!(lc.shutdown(), Transition::Applied);
        assert_eq!(lc.shutdown(), Transition::NoOp);
        assert_eq!(lc.init(), Transition::Refused(LifecycleState::Shutdown));
        assert_eq!(lc.start(), Transition::Refused(LifecycleState::Shutdown));
        lc.fail();
        assert_eq!(lc.state(), LifecycleState::Shutdown);
    }

    #[test]
    fn test_error_state_recovers_through_init() {
        let lc = Lifecycle::new();
        lc.init();
        lc.fail();
        assert_eq!(lc.state(), LifecycleState::Error);
        assert!(!lc.state().is_ready());
        assert_eq!(lc.init(), Transition::Applied);
        assert_eq!(lc.state(), LifecycleState::Initialized);
    }

    #[test]
    fn test_run_if_gates_on_state() {
        let lc = Lifecycle::new();
        let denied = lc.run_if(|s| s == LifecycleState::Running, || 1);
        assert_eq!(denied, Err(LifecycleState::Stopped));
        lc.init();
        lc.start();
        assert_eq!(lc.run_if(|s| s == LifecycleState::Running, || 1), Ok(1));
    }
}
