use serde::{Deserialize, Serialize};

/// Verdict handed back to the host request loop by
/// [`check_for_changes`](crate::manager::WorkerLifecycleManager::check_for_changes).
///
/// The host obeys the verdict and owns everything else: `Continue` keeps
/// serving, `Restart`/`Terminate` mean exit now (the supervisor brings a
/// fresh process up for `Restart`), `Draining` means stop accepting and
/// keep polling until the in-flight work finishes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    /// Keep serving; nothing to do, or the change was patched in place.
    Continue,
    /// Nothing in flight; exit so the supervisor restarts the process.
    Restart,
    /// Draining: refuse new work, let in-flight requests finish.
    Draining,
    /// Exit immediately; the operator wants the process gone.
    Terminate,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Continue => "continue",
            LifecycleAction::Restart => "restart",
            LifecycleAction::Draining => "draining",
            LifecycleAction::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
