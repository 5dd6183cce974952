use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a worker process.
///
/// State machine transitions:
/// - `Booting` → `Ready` (startup completed)
/// - `Booting` → `Draining` | `Terminated` (drain requested before the
///   worker ever served; an aborted boot must not come up serving)
/// - `Ready` → `Draining` (drain begun with requests in flight)
/// - `Ready` → `Terminated` (drain begun with nothing in flight, or a
///   forced terminate)
/// - `Draining` → `Terminated` (last in-flight request finished)
/// - `Terminated` is absorbing: no event moves a worker back toward `Ready`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Process is starting up; not yet accepting requests.
    Booting,
    /// Serving requests.
    Ready,
    /// Refusing new requests while in-flight ones finish.
    Draining,
    /// Done. The host is expected to exit (and usually restart) promptly.
    Terminated,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Booting => write!(f, "booting"),
            WorkerState::Ready => write!(f, "ready"),
            WorkerState::Draining => write!(f, "draining"),
            WorkerState::Terminated => write!(f, "terminated"),
        }
    }
}

impl WorkerState {
    /// New work is accepted only while `Ready`.
    pub fn can_accept_requests(&self) -> bool {
        matches!(self, WorkerState::Ready)
    }

    /// The host should exit only once `Terminated`.
    pub fn should_terminate(&self) -> bool {
        matches!(self, WorkerState::Terminated)
    }

    /// Check if transitioning from the current state to `new_state` is valid.
    /// Same state is always valid (no-op).
    pub fn can_transition_to(&self, new_state: &WorkerState) -> bool {
        if self == new_state {
            return true;
        }

        match self {
            WorkerState::Booting => matches!(
                new_state,
                WorkerState::Ready | WorkerState::Draining | WorkerState::Terminated
            ),
            WorkerState::Ready => {
                matches!(new_state, WorkerState::Draining | WorkerState::Terminated)
            }
            WorkerState::Draining => matches!(new_state, WorkerState::Terminated),
            WorkerState::Terminated => false,
        }
    }

    /// Attempt to transition to `new_state`, returning an error if invalid.
    pub fn try_transition(&self, new_state: WorkerState) -> Result<WorkerState> {
        if self.can_transition_to(&new_state) {
            Ok(new_state)
        } else {
            bail!("Invalid worker state transition: {self} -> {new_state}")
        }
    }

    /// Returns the list of valid states this state can transition to.
    pub fn valid_transitions(&self) -> Vec<WorkerState> {
        match self {
            WorkerState::Booting => vec![
                WorkerState::Ready,
                WorkerState::Draining,
                WorkerState::Terminated,
            ],
            WorkerState::Ready => vec![WorkerState::Draining, WorkerState::Terminated],
            WorkerState::Draining => vec![WorkerState::Terminated],
            WorkerState::Terminated => vec![],
        }
    }
}
