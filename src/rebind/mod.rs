//! In-place service rebinding
//!
//! The container side of zero-downtime reloads: when a service definition
//! changes, the worker replaces that one binding in place instead of
//! restarting the whole process. Rebinds are counted per binding and
//! globally; past a configurable total the worker stops patching itself and
//! escalates to a clean restart.

use std::any::Any;
use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::debug;

/// Factory producing a fresh service instance.
pub type ServiceFactory = Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Callback fired after a binding is replaced.
pub type RebindHook = Box<dyn FnMut(&str) + Send>;

/// The narrow container contract the lifecycle manager drives.
///
/// The full DI container (auto-wiring, tagging, hierarchy) is external; the
/// manager only needs to trigger a rebind for an affected binding and ask
/// whether the process has patched itself too many times to keep running.
pub trait RebindGovernor {
    /// Re-bind `name` in place using its current definition.
    fn rebind(&mut self, name: &str) -> Result<()>;

    /// Times `name` has been rebound since the last counter reset.
    fn rebind_count(&self, name: &str) -> u64;

    /// Total rebinds across all bindings since the last counter reset.
    fn total_rebind_count(&self) -> u64;

    /// Whether the total rebind count has passed the configured maximum.
    fn exceeds_rebind_threshold(&self) -> bool;

    /// Reconfigure the maximum total rebinds tolerated before escalation.
    fn set_max_rebinds_before_restart(&mut self, max: u64);
}

/// In-memory binding registry implementing the governor contract.
///
/// Long-lived workers share bindings across requests, so the registry
/// exposes an explicit [`reset_counters`](Self::reset_counters) instead of
/// relying on a process restart to clear its bookkeeping.
#[derive(Default)]
pub struct RebindRegistry {
    factories: HashMap<String, ServiceFactory>,
    counts: HashMap<String, u64>,
    total: u64,
    max_before_restart: u64,
    hooks: HashMap<String, Vec<RebindHook>>,
}

impl RebindRegistry {
    pub fn new(max_before_restart: u64) -> Self {
        Self {
            max_before_restart,
            ..Self::default()
        }
    }

    /// Register the initial factory for `name`. Not counted as a rebind.
    pub fn bind<S: Into<String>>(&mut self, name: S, factory: ServiceFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Replace the factory for `name`, returning the previous one.
    /// Counts as a rebind and fires any hooks registered for `name`.
    pub fn rebind_with(&mut self, name: &str, factory: ServiceFactory) -> Option<ServiceFactory> {
        let previous = self.factories.insert(name.to_string(), factory);
        self.record_rebind(name);
        previous
    }

    /// Build a fresh instance of `name` from its current factory.
    pub fn resolve(&self, name: &str) -> Option<Box<dyn Any + Send + Sync>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Register a callback fired after each rebind of `name`.
    pub fn on_rebind<S: Into<String>>(&mut self, name: S, hook: RebindHook) {
        self.hooks.entry(name.into()).or_default().push(hook);
    }

    /// Zero all rebind bookkeeping, e.g. after a config epoch rolls over.
    pub fn reset_counters(&mut self) {
        self.counts.clear();
        self.total = 0;
    }

    fn record_rebind(&mut self, name: &str) {
        *self.counts.entry(name.to_string()).or_insert(0) += 1;
        self.total += 1;
        debug!(binding = name, total = self.total, "Binding replaced in place");

        if let Some(hooks) = self.hooks.get_mut(name) {
            for hook in hooks {
                hook(name);
            }
        }
    }
}

impl RebindGovernor for RebindRegistry {
    fn rebind(&mut self, name: &str) -> Result<()> {
        if !self.factories.contains_key(name) {
            bail!("No binding registered for: {name}");
        }
        self.record_rebind(name);
        Ok(())
    }

    fn rebind_count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    fn total_rebind_count(&self) -> u64 {
        self.total
    }

    fn exceeds_rebind_threshold(&self) -> bool {
        self.total > self.max_before_restart
    }

    fn set_max_rebinds_before_restart(&mut self, max: u64) {
        self.max_before_restart = max;
    }
}
