//! Worker lifecycle management
//!
//! The orchestrator of zero-downtime reloads. One manager owns the worker's
//! state and in-flight counter; once per host-loop iteration it consults
//! the pending restart signal and the change detector, and answers with a
//! single [`LifecycleAction`] the host obeys. In-flight requests are never
//! interrupted: draining exists precisely so accepted work finishes while
//! new work is refused.


use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::ManagerConfig;
use crate::detector::{ModuleChange, ModuleChangeDetector, WatchSpec};
use crate::fs::signal_files::consume_signal;
use crate::models::action::LifecycleAction;
use crate::models::change::ChangeType;
use crate::models::signal::SignalAction;
use crate::models::state::WorkerState;
use crate::rebind::RebindGovernor;

/// Injected logger callable; receives one already-formatted line.
pub type Logger = Box<dyn Fn(&str) + Send>;

/// Collaborator that applies a configuration hot-swap to the running
/// process. Loading mechanics are external; the manager only triggers it.
pub trait ConfigReloader {
    fn reload(&mut self) -> Result<()>;
}

/// Decides, between requests, whether the worker keeps serving, patches
/// itself in place, or drains and restarts.
///
/// Single-threaded by design: exactly one process instance owns a manager
/// and nothing inside the process mutates it concurrently. The signal file
/// is the only cross-process resource, and
/// [`consume_signal`](crate::fs::signal_files::consume_signal) is its sole
/// consumer-side mutator.
pub struct WorkerLifecycleManager {
    config: ManagerConfig,
    state: WorkerState,
    inflight: u64,
    calls_since_scan: u32,
    detector: ModuleChangeDetector,
    container: Option<Box<dyn RebindGovernor + Send>>,
    config_reloader: Option<Box<dyn ConfigReloader + Send>>,
    logger: Option<Logger>,
}

impl WorkerLifecycleManager {
    /// Build a manager in `Booting` state. Fails fast on misconfiguration:
    /// the signal file's directory must already exist.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: WorkerState::Booting,
            inflight: 0,
            calls_since_scan: 0,
            detector: ModuleChangeDetector::new(),
            container: None,
            config_reloader: None,
            logger: None,
        })
    }

    /// Mark startup complete; the worker begins accepting requests.
    pub fn mark_ready(&mut self) -> Result<()> {
        self.state = self.state.try_transition(WorkerState::Ready)?;
        Ok(())
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn can_accept_requests(&self) -> bool {
        self.state.can_accept_requests()
    }

    pub fn should_terminate(&self) -> bool {
        self.state.should_terminate()
    }

    pub fn inflight_count(&self) -> u64 {
        self.inflight
    }

    /// Bookkeeping for an accepted request.
    pub fn request_started(&mut self) {
        self.inflight = self.inflight.saturating_add(1);
    }

    /// Bookkeeping for a finished request. Floored at zero against a
    /// double-finish; while draining, the last finish completes the drain.
    pub fn request_finished(&mut self) {
        if self.inflight == 0 {
            warn!("request_finished called with nothing in flight");
            return;
        }

        self.inflight -= 1;

        if self.state == WorkerState::Draining && self.inflight == 0 {
            self.state = WorkerState::Terminated;
            self.log("Drain complete: last in-flight request finished, ready to restart");
        }
    }

    /// Stop accepting new work and let in-flight requests finish.
    ///
    /// With nothing in flight the worker terminates immediately and the
    /// host should restart (`Restart`); otherwise it drains (`Draining`).
    /// Idempotent: repeated calls while draining or terminated return the
    /// corresponding action without re-transitioning.
    pub fn begin_drain(&mut self, reason: &str) -> LifecycleAction {
        match self.state {
            WorkerState::Draining => LifecycleAction::Draining,
            WorkerState::Terminated => LifecycleAction::Restart,
            WorkerState::Booting | WorkerState::Ready => {
                if self.inflight == 0 {
                    self.state = WorkerState::Terminated;
                    self.log(&format!(
                        "Drain begun ({reason}): nothing in flight, ready to restart"
                    ));
                    LifecycleAction::Restart
                } else {
                    self.state = WorkerState::Draining;
                    self.log(&format!(
                        "Drain begun ({reason}): waiting for {} in-flight request(s), advisory timeout {}s",
                        self.inflight, self.config.drain_timeout_secs
                    ));
                    LifecycleAction::Draining
                }
            }
        }
    }

    /// Terminate now, in-flight work notwithstanding. The host is expected
    /// to exit promptly; only external supervision cancels in-flight work.
    pub fn force_terminate(&mut self, reason: &str) {
        if self.state == WorkerState::Terminated {
            return;
        }
        self.state = WorkerState::Terminated;
        self.log(&format!(
            "Forced terminate ({reason}): {} request(s) still in flight",
            self.inflight
        ));
    }

    /// The once-per-loop-iteration decision procedure.
    ///
    /// Consults the pending restart signal, then the change detector, and
    /// maps the result to the action the host obeys. Nothing in here throws
    /// into the request loop: signal and detector failures degrade to the
    /// conservative outcome (toward restart, never silently toward
    /// continue).
    pub fn check_for_changes(&mut self) -> LifecycleAction {
        match self.state {
            WorkerState::Terminated => LifecycleAction::Terminate,
            WorkerState::Draining => LifecycleAction::Draining,
            // Instructions are for a serving worker; one that never reached
            // Ready acts on nothing.
            WorkerState::Booting => LifecycleAction::Continue,
            WorkerState::Ready => self.check_ready(),
        }
    }

    fn check_ready(&mut self) -> LifecycleAction {
        let pending = consume_signal(&self.config.signal_path, self.config.signal_max_age_secs);

        let Some(signal) = pending else {
            if self.scan_due() {
                return self.run_scan();
            }
            return LifecycleAction::Continue;
        };

        match signal.action {
            SignalAction::Terminate => {
                let reason = signal.reason.as_deref().unwrap_or("terminate signal");
                self.force_terminate(reason);
                LifecycleAction::Terminate
            }
            SignalAction::Restart => {
                let reason = signal
                    .reason
                    .unwrap_or_else(|| "restart signal".to_string());
                self.begin_drain(&reason)
            }
            SignalAction::Swap => self.run_scan(),
        }
    }

    fn scan_due(&mut self) -> bool {
        if self.config.check_interval_requests == 0 {
            return true;
        }

        self.calls_since_scan += 1;
        self.calls_since_scan >= self.config.check_interval_requests
    }

    fn run_scan(&mut self) -> LifecycleAction {
        self.calls_since_scan = 0;
        let changes = self.detector.detect_all();
        let overall = changes
            .iter()
            .fold(ChangeType::None, |acc, module| acc.combine(module.change));

        match overall {
            ChangeType::None => LifecycleAction::Continue,
            ChangeType::Config => self.apply_hot_swap(),
            ChangeType::Rebindable => {
                // Baselines advance on every scan, so a config change seen
                // alongside a rebindable one must be applied now or lost.
                if changes.iter().any(|c| c.change == ChangeType::Config) {
                    let action = self.apply_hot_swap();
                    if action != LifecycleAction::Continue {
                        return action;
                    }
                }
                self.apply_rebinds(&changes)
            }
            ChangeType::Source => {
                let modules: Vec<&str> = changes
                    .iter()
                    .filter(|c| c.change == ChangeType::Source)
                    .map(|c| c.module.as_str())
                    .collect();
                self.begin_drain(&format!("source changed in {}", modules.join(", ")))
            }
        }
    }

    fn apply_hot_swap(&mut self) -> LifecycleAction {
        if self.config_reloader.is_none() {
            warn!("Configuration changed with no reloader attached");
            return self.begin_drain("config changed, no reloader attached");
        }

        let mut outcome = Ok(());
        if let Some(reloader) = self.config_reloader.as_mut() {
            outcome = reloader.reload();
        }

        match outcome {
            Ok(()) => {
                self.log("Configuration hot-swapped in place");
                LifecycleAction::Continue
            }
            Err(err) => {
                warn!(%err, "Configuration hot-swap failed");
                self.begin_drain("config hot-swap failed")
            }
        }
    }

    fn apply_rebinds(&mut self, changes: &[ModuleChange]) -> LifecycleAction {
        let affected: Vec<&str> = changes
            .iter()
            .filter(|c| c.change == ChangeType::Rebindable)
            .map(|c| c.module.as_str())
            .collect();

        if self.container.is_none() {
            warn!("Rebindable change detected with no container attached");
            return self.begin_drain("rebindable change, no container attached");
        }

        let mut failed: Option<String> = None;
        let mut threshold_total: Option<u64> = None;
        if let Some(container) = self.container.as_mut() {
            for name in &affected {
                if let Err(err) = container.rebind(name) {
                    warn!(binding = name, %err, "In-place rebind failed");
                    failed = Some((*name).to_string());
                    break;
                }
            }
            if failed.is_none() && container.exceeds_rebind_threshold() {
                threshold_total = Some(container.total_rebind_count());
            }
        }

        if let Some(name) = failed {
            return self.begin_drain(&format!("rebind failed for {name}"));
        }
        if let Some(total) = threshold_total {
            self.log(&format!(
                "Rebind threshold exceeded after {total} total rebinds"
            ));
            return self.begin_drain("rebind threshold exceeded");
        }
        LifecycleAction::Continue
    }

    /// Watch a module; a convenience delegating to the detector.
    pub fn register_module<S: Into<String>>(&mut self, id: S, spec: WatchSpec) {
        self.detector.register_module(id, spec);
    }

    pub fn detector(&self) -> &ModuleChangeDetector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut ModuleChangeDetector {
        &mut self.detector
    }

    /// The config hot-swap collaborator, if one has been attached yet.
    pub fn config_reloader(&self) -> Option<&(dyn ConfigReloader + Send)> {
        self.config_reloader.as_deref()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn set_signal_path(&mut self, path: PathBuf) {
        self.config.signal_path = path;
    }

    pub fn set_drain_timeout(&mut self, secs: u64) {
        self.config.drain_timeout_secs = secs;
    }

    pub fn set_check_interval(&mut self, requests: u32) {
        self.config.check_interval_requests = requests;
    }

    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = Some(logger);
    }

    /// Attach the container; the configured rebind threshold is pushed into
    /// it so both sides agree on when to stop patching in place.
    pub fn set_container(&mut self, mut container: Box<dyn RebindGovernor + Send>) {
        container.set_max_rebinds_before_restart(self.config.max_rebinds_before_restart);
        self.container = Some(container);
    }

    pub fn set_config_reloader(&mut self, reloader: Box<dyn ConfigReloader + Send>) {
        self.config_reloader = Some(reloader);
    }

    fn log(&self, message: &str) {
        info!("{message}");
        if let Some(logger) = &self.logger {
            logger(message);
        }
    }
}
