//! Shared helpers for warden integration tests

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use warden::config::ManagerConfig;
use warden::manager::WorkerLifecycleManager;

/// Install a test-friendly tracing subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn signal_path(dir: &TempDir) -> PathBuf {
    dir.path().join("signal.json")
}

/// A manager that finished booting, checking the signal file under `dir`
/// and scanning on every call.
pub fn ready_manager(dir: &TempDir) -> WorkerLifecycleManager {
    init_tracing();
    let mut manager = WorkerLifecycleManager::new(ManagerConfig::new(signal_path(dir)))
        .expect("Signal directory should exist");
    manager.mark_ready().expect("Booting -> Ready should be valid");
    manager
}

/// Write `content` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Should create parent directories");
    }
    fs::write(path, content).expect("Should write file");
}
