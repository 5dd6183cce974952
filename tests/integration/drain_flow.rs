//! Drain and restart flows driven the way a host worker loop would

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use warden::fs::send_signal;
use warden::models::action::LifecycleAction;
use warden::models::signal::SignalAction;
use warden::models::state::WorkerState;

use super::helpers::*;

#[test]
fn test_fresh_worker_boots_before_serving() {
    let dir = TempDir::new().unwrap();
    init_tracing();

    let mut manager = warden::manager::WorkerLifecycleManager::new(
        warden::config::ManagerConfig::new(signal_path(&dir)),
    )
    .unwrap();

    assert_eq!(manager.state(), WorkerState::Booting);
    assert!(!manager.can_accept_requests());
    assert_eq!(manager.inflight_count(), 0);

    manager.mark_ready().unwrap();
    assert!(manager.can_accept_requests());
}

#[test]
fn test_graceful_restart_under_load() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    // Three requests are being served when the deploy lands.
    manager.request_started();
    manager.request_started();
    manager.request_started();

    send_signal(&signal_path(&dir), SignalAction::Restart, Some("deploy 7")).unwrap();

    // The loop obeys: stop accepting, keep polling while work drains.
    assert_eq!(manager.check_for_changes(), LifecycleAction::Draining);
    assert!(!manager.can_accept_requests());

    manager.request_finished();
    assert_eq!(manager.check_for_changes(), LifecycleAction::Draining);
    manager.request_finished();
    assert_eq!(manager.check_for_changes(), LifecycleAction::Draining);

    // Last request out completes the drain; the loop sees terminate and
    // exits so the supervisor can start a fresh process.
    manager.request_finished();
    assert_eq!(manager.state(), WorkerState::Terminated);
    assert_eq!(manager.check_for_changes(), LifecycleAction::Terminate);
}

#[test]
fn test_no_event_resurrects_a_draining_worker() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    manager.request_started();
    manager.begin_drain("deploy");

    // Once draining, acceptance stays off for every subsequent call.
    for _ in 0..5 {
        assert!(!manager.can_accept_requests());
        assert_eq!(manager.check_for_changes(), LifecycleAction::Draining);
    }

    assert!(manager.mark_ready().is_err());
}

#[test]
fn test_operator_terminate_wins_over_inflight_work() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);
    let logs: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = logs.clone();
    manager.set_logger(Box::new(move |message| {
        sink.lock().unwrap().push(message.to_string());
    }));

    manager.request_started();
    manager.request_started();

    send_signal(
        &signal_path(&dir),
        SignalAction::Terminate,
        Some("stuck worker"),
    )
    .unwrap();

    assert_eq!(manager.check_for_changes(), LifecycleAction::Terminate);
    assert!(manager.should_terminate());
    assert!(logs
        .lock()
        .unwrap()
        .iter()
        .any(|line| line.contains("stuck worker")));
}

#[test]
fn test_idle_worker_restarts_immediately_on_drain() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    assert_eq!(manager.begin_drain("deploy"), LifecycleAction::Restart);
    assert!(manager.should_terminate());

    // Repeated drains and checks keep answering the same thing.
    assert_eq!(manager.begin_drain("deploy"), LifecycleAction::Restart);
    assert_eq!(manager.check_for_changes(), LifecycleAction::Terminate);
}

#[test]
fn test_quiet_loop_keeps_continuing() {
    let dir = TempDir::new().unwrap();
    let mut manager = ready_manager(&dir);

    for _ in 0..10 {
        assert_eq!(manager.check_for_changes(), LifecycleAction::Continue);
        manager.request_started();
        manager.request_finished();
    }

    assert_eq!(manager.state(), WorkerState::Ready);
    assert_eq!(manager.inflight_count(), 0);
}
