//! Manager configuration
//!
//! Tunables for the lifecycle manager, constructible in code or loadable
//! from a TOML file. Every field except the signal path has a default, so a
//! partial file works.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default advisory drain budget handed to the host, in seconds.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

/// Default staleness window for restart signals, in seconds. Signals older
/// than this are discarded unread.
pub const DEFAULT_SIGNAL_MAX_AGE_SECS: u64 = 300;

/// Default number of in-place rebinds tolerated before the worker escalates
/// to a restart.
pub const DEFAULT_MAX_REBINDS_BEFORE_RESTART: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Path of the JSON signal file written by deploy tooling.
    pub signal_path: PathBuf,

    /// Advisory drain budget in seconds. The core never enforces it; the
    /// host is expected to force-kill a stalled drain after this long.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Run the change detector every N `check_for_changes` calls.
    /// 0 scans on every call.
    #[serde(default)]
    pub check_interval_requests: u32,

    /// Staleness window for restart signals, in seconds.
    #[serde(default = "default_signal_max_age_secs")]
    pub signal_max_age_secs: u64,

    /// Total in-place rebinds tolerated before escalating to a restart.
    #[serde(default = "default_max_rebinds")]
    pub max_rebinds_before_restart: u64,
}

fn default_drain_timeout_secs() -> u64 {
    DEFAULT_DRAIN_TIMEOUT_SECS
}

fn default_signal_max_age_secs() -> u64 {
    DEFAULT_SIGNAL_MAX_AGE_SECS
}

fn default_max_rebinds() -> u64 {
    DEFAULT_MAX_REBINDS_BEFORE_RESTART
}

impl ManagerConfig {
    /// Configuration with defaults for everything but the signal path.
    pub fn new<P: Into<PathBuf>>(signal_path: P) -> Self {
        Self {
            signal_path: signal_path.into(),
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
            check_interval_requests: 0,
            signal_max_age_secs: DEFAULT_SIGNAL_MAX_AGE_SECS,
            max_rebinds_before_restart: DEFAULT_MAX_REBINDS_BEFORE_RESTART,
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ManagerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// The directory the signal file lives in.
    pub fn signal_dir(&self) -> PathBuf {
        match self.signal_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Fail fast on misconfiguration: the signal file's directory must exist
    /// before a manager is built around it.
    pub fn validate(&self) -> Result<()> {
        let dir = self.signal_dir();
        if !dir.is_dir() {
            bail!("Signal directory does not exist: {}", dir.display());
        }
        Ok(())
    }
}
