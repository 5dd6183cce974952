//! End-to-end change detection against real module trees

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use warden::config::ManagerConfig;
use warden::detector::WatchSpec;
use warden::manager::{ConfigReloader, WorkerLifecycleManager};
use warden::models::action::LifecycleAction;
use warden::models::change::ChangeType;
use warden::models::state::WorkerState;
use warden::rebind::{RebindGovernor, RebindRegistry};

use super::helpers::*;

struct CountingReloader(Arc<AtomicU64>);

impl ConfigReloader for CountingReloader {
    fn reload(&mut self) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_config_deploy_is_patched_without_restart() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    let reloads = Arc::new(AtomicU64::new(0));
    manager.set_config_reloader(Box::new(CountingReloader(reloads.clone())));

    let config = dir.path().join("modules/app/config.toml");
    write_file(&config, "workers = 4\n");
    manager.register_module("app", WatchSpec::new().with_config(&config));

    // Nothing on disk moved yet.
    assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);
    assert_eq!(reloads.load(Ordering::SeqCst), 0);

    // Deploy rewrites the config; the worker patches itself in place.
    write_file(&config, "workers = 8\nqueue = \"high\"\n");
    assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
    assert_eq!(manager.state(), WorkerState::Ready);

    // The same deploy is not re-applied on later iterations.
    assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_source_deploy_forces_a_restart() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    let sources = dir.path().join("modules/app/src/*.rs");
    write_file(&dir.path().join("modules/app/src/handler.rs"), "fn v1() {}\n");
    manager.register_module("app", WatchSpec::new().with_sources([&sources]));

    assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);

    // A brand-new source file lands under the watched pattern.
    write_file(
        &dir.path().join("modules/app/src/new_route.rs"),
        "fn added() {}\n",
    );

    assert_eq!(manager.check_for_changes(), LifecycleAction::Restart);
    assert!(manager.should_terminate());
}

#[test]
fn test_definition_deploy_rebinds_one_service() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    let mailer_marker = dir.path().join("modules/mailer/bindings.marker");
    let billing_marker = dir.path().join("modules/billing/bindings.marker");
    write_file(&mailer_marker, "epoch 1\n");
    write_file(&billing_marker, "epoch 1\n");
    manager.register_module("mailer", WatchSpec::new().with_rebind_marker(&mailer_marker));
    manager.register_module(
        "billing",
        WatchSpec::new().with_rebind_marker(&billing_marker),
    );

    let mut registry = RebindRegistry::new(10);
    registry.bind("mailer", Box::new(|| Box::new("smtp".to_string())));
    registry.bind("billing", Box::new(|| Box::new("stripe".to_string())));
    let rebound = Arc::new(AtomicU64::new(0));
    let observed = rebound.clone();
    registry.on_rebind(
        "mailer",
        Box::new(move |name| {
            assert_eq!(name, "mailer");
            observed.fetch_add(1, Ordering::SeqCst);
        }),
    );
    manager.set_container(Box::new(registry));

    // Only the mailer module's definition changes.
    write_file(&mailer_marker, "epoch 2 rebound\n");

    assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);
    assert_eq!(rebound.load(Ordering::SeqCst), 1);
    assert!(manager.can_accept_requests());
}

#[test]
fn test_repeated_definition_deploys_eventually_escalate() {
    let dir = TempDir::new().unwrap();
    init_tracing();

    let mut config = ManagerConfig::new(signal_path(&dir));
    config.max_rebinds_before_restart = 2;
    let mut manager = WorkerLifecycleManager::new(config).unwrap();
    manager.mark_ready().unwrap();

    let marker = dir.path().join("modules/mailer/bindings.marker");
    write_file(&marker, "epoch 1\n");
    manager.register_module("mailer", WatchSpec::new().with_rebind_marker(&marker));

    // The manager pushes its own threshold into the container on attach.
    let mut registry = RebindRegistry::new(100);
    registry.bind("mailer", Box::new(|| Box::new(())));
    manager.set_container(Box::new(registry));

    // First two definition deploys are patched in place.
    write_file(&marker, "epoch 2\n");
    assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);
    write_file(&marker, "epoch 3\n");
    assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);
    assert_eq!(manager.state(), WorkerState::Ready);

    // The third passes the threshold: stop patching, restart cleanly.
    write_file(&marker, "epoch 4\n");
    assert_eq!(manager.check_for_changes(), LifecycleAction::Restart);
    assert!(manager.should_terminate());
}

#[test]
fn test_deleted_module_tree_fails_toward_restart() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    let config = dir.path().join("modules/app/config.toml");
    let source = dir.path().join("modules/app/src/handler.rs");
    write_file(&config, "workers = 4\n");
    write_file(&source, "fn handle() {}\n");
    manager.register_module(
        "app",
        WatchSpec::new().with_config(&config).with_sources([&source]),
    );

    fs::remove_dir_all(dir.path().join("modules/app")).unwrap();

    assert_eq!(manager.check_for_changes(), LifecycleAction::Restart);
}

#[test]
fn test_detector_severity_aggregation_across_modules() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    let config = dir.path().join("a/config.toml");
    let marker = dir.path().join("b/bindings.marker");
    write_file(&config, "a = 1\n");
    write_file(&marker, "epoch 1\n");
    manager.register_module("a", WatchSpec::new().with_config(&config));
    manager.register_module("b", WatchSpec::new().with_rebind_marker(&marker));

    write_file(&config, "a = 2\n");
    write_file(&marker, "epoch 2\n");

    assert!(manager.detector().is_registered("a"));
    assert!(manager.detector().is_registered("b"));

    let detector = manager.detector_mut();
    let changes = detector.detect_all();
    let overall = changes
        .iter()
        .fold(ChangeType::None, |acc, c| acc.combine(c.change));
    assert_eq!(overall, ChangeType::Rebindable);

    // Governor counters are observable through the trait surface.
    let mut registry = RebindRegistry::new(10);
    registry.bind("b", Box::new(|| Box::new(())));
    registry.rebind("b").unwrap();
    assert_eq!(registry.rebind_count("b"), 1);
    assert_eq!(registry.total_rebind_count(), 1);
    assert!(!registry.exceeds_rebind_threshold());
}
