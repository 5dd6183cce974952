//! Module change detection
//!
//! Between requests, the worker scans each registered module's watched
//! paths and classifies how far the on-disk state has drifted from what it
//! loaded: untouched, config-only, rebindable definition, or source.

pub mod fingerprint;


use std::collections::BTreeMap;

use crate::models::change::ChangeType;
use fingerprint::{diff, snapshot, Fingerprint};

pub use fingerprint::WatchSpec;

/// Per-module result of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleChange {
    pub module: String,
    pub change: ChangeType,
}

/// Scans watched module paths and reports a [`ChangeType`] per module, plus
/// a max-severity aggregate.
///
/// Every scan replaces the stored baseline fingerprints, so a change is
/// reported exactly once no matter how many times the detector runs
/// afterward.
#[derive(Debug, Default)]
pub struct ModuleChangeDetector {
    modules: BTreeMap<String, WatchedModule>,
}

#[derive(Debug)]
struct WatchedModule {
    spec: WatchSpec,
    baseline: Fingerprint,
}

impl ModuleChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a module. The current on-disk state becomes the baseline, so
    /// registration itself never reports a change. Re-registering an id
    /// replaces its watch spec and re-baselines.
    pub fn register_module<S: Into<String>>(&mut self, id: S, spec: WatchSpec) {
        let baseline = snapshot(&spec);
        self.modules.insert(id.into(), WatchedModule { spec, baseline });
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Scan one module and advance its baseline. Unknown ids report
    /// `ChangeType::None`: nothing is watched, so nothing changed.
    pub fn detect(&mut self, id: &str) -> ChangeType {
        let Some(module) = self.modules.get_mut(id) else {
            return ChangeType::None;
        };

        let current = snapshot(&module.spec);
        let change = diff(&module.baseline, &current);
        module.baseline = current;
        change
    }

    /// Scan every registered module once, returning per-module results.
    pub fn detect_all(&mut self) -> Vec<ModuleChange> {
        let mut changes = Vec::with_capacity(self.modules.len());

        for (id, module) in &mut self.modules {
            let current = snapshot(&module.spec);
            let change = diff(&module.baseline, &current);
            module.baseline = current;
            changes.push(ModuleChange {
                module: id.clone(),
                change,
            });
        }

        changes
    }

    /// Max severity across all registered modules; `ChangeType::None` when
    /// none are registered or none changed.
    pub fn detect_overall(&mut self) -> ChangeType {
        self.detect_all()
            .into_iter()
            .fold(ChangeType::None, |acc, module| acc.combine(module.change))
    }
}
