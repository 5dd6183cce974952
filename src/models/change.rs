use serde::{Deserialize, Serialize};

/// How far the code or configuration on disk has drifted from what the
/// running worker loaded, and therefore which remediation applies.
///
/// Variant order is escalation order: `None` < `Config` < `Rebindable` <
/// `Source`. The derived `Ord` follows it, so the most disruptive change
/// among simultaneous ones is simply the max.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Nothing changed since the last scan.
    None,
    /// Only configuration changed; it can be hot-swapped in place.
    Config,
    /// A service definition changed; it can be rebound in the container
    /// without a restart.
    Rebindable,
    /// Source changed; only a fresh process picks it up.
    Source,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::None => write!(f, "none"),
            ChangeType::Config => write!(f, "config"),
            ChangeType::Rebindable => write!(f, "rebindable"),
            ChangeType::Source => write!(f, "source"),
        }
    }
}

impl ChangeType {
    /// Numeric severity, 0 (no change) through 3 (source changed).
    pub fn severity(&self) -> u8 {
        match self {
            ChangeType::None => 0,
            ChangeType::Config => 1,
            ChangeType::Rebindable => 2,
            ChangeType::Source => 3,
        }
    }

    /// Only a source change forces a full drain-and-restart.
    pub fn requires_restart(&self) -> bool {
        matches!(self, ChangeType::Source)
    }

    /// Only configuration can be swapped in place without touching the
    /// container.
    pub fn can_hot_swap(&self) -> bool {
        matches!(self, ChangeType::Config)
    }

    /// Config and rebindable changes can be resolved through the container
    /// while the process keeps running.
    pub fn can_rebind(&self) -> bool {
        matches!(self, ChangeType::Config | ChangeType::Rebindable)
    }

    /// Fold two observations into the more disruptive one. `None` is the
    /// identity.
    pub fn combine(self, other: ChangeType) -> ChangeType {
        self.max(other)
    }
}
