use anyhow::bail;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// What the sender of a restart signal wants the worker to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    /// Drain gracefully, then exit so the supervisor restarts the process.
    Restart,
    /// Exit immediately, in-flight work notwithstanding.
    Terminate,
    /// Run the change detector now and patch in place where possible.
    Swap,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Restart => write!(f, "restart"),
            SignalAction::Terminate => write!(f, "terminate"),
            SignalAction::Swap => write!(f, "swap"),
        }
    }
}

impl std::str::FromStr for SignalAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "restart" => Ok(SignalAction::Restart),
            "terminate" => Ok(SignalAction::Terminate),
            "swap" => Ok(SignalAction::Swap),
            _ => bail!("Invalid signal action: {s}. Valid values: restart, terminate, swap"),
        }
    }
}

/// The at-most-once message a deploy tool leaves for a running worker.
///
/// Persisted as a single JSON object: `{"action", "timestamp", "reason"}`
/// with the timestamp in unix seconds and `reason` allowed to be null.
/// File absence means no pending signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestartSignal {
    pub action: SignalAction,
    pub timestamp: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl RestartSignal {
    /// Build a signal stamped with the current time.
    pub fn new(action: SignalAction, reason: Option<String>) -> Self {
        Self {
            action,
            timestamp: Utc::now().timestamp(),
            reason,
        }
    }

    /// Seconds since the signal was written. Negative if the sender's clock
    /// is ahead of ours.
    pub fn age_seconds(&self) -> i64 {
        Utc::now().timestamp() - self.timestamp
    }

    /// A signal older than the staleness window must never fire; it was
    /// meant for an earlier boot.
    pub fn is_stale(&self, max_age_secs: u64) -> bool {
        self.age_seconds() > max_age_secs as i64
    }
}
