//! Restart-signal file I/O
//!
//! One JSON file at a configurable path is the whole channel between deploy
//! tooling and a running worker: no sockets, no broker. The sender
//! publishes atomically (write to a temp file in the same directory, then
//! rename) so the worker never observes a partial write; the worker reads
//! then deletes. Delivery is deliberately at-most-once, last-write-wins:
//! this is not a durable queue.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::SignalError;
use crate::models::signal::{RestartSignal, SignalAction};

/// Write `signal` to `path`, replacing any unconsumed prior signal.
///
/// The staged temp file lives in the destination directory so the final
/// rename stays on one filesystem and is atomic.
pub fn write_signal(path: &Path, signal: &RestartSignal) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let json =
        serde_json::to_string_pretty(signal).context("Failed to serialize restart signal")?;

    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to stage signal file in {}", parent.display()))?;
    staged
        .write_all(json.as_bytes())
        .context("Failed to write staged signal file")?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to publish signal file: {}", path.display()))?;

    Ok(())
}

/// Publish a signal stamped with the current time. Overwrites any
/// unconsumed prior signal (last write wins).
pub fn send_signal(path: &Path, action: SignalAction, reason: Option<&str>) -> Result<()> {
    write_signal(path, &RestartSignal::new(action, reason.map(str::to_owned)))
}

fn read_signal(path: &Path) -> Result<RestartSignal, SignalError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Consume the pending signal at `path`, if any.
///
/// An absent file means no signal. A signal older than `max_age_secs` is
/// deleted and reported as absent; a stale message must never fire on a
/// later, unrelated boot. A malformed or unreadable file is deleted and
/// treated the same way. A fresh signal is deleted before it is returned,
/// so a second call sees nothing (single delivery). Never panics and never
/// returns an error into the request loop.
pub fn consume_signal(path: &Path, max_age_secs: u64) -> Option<RestartSignal> {
    if !path.exists() {
        return None;
    }

    let signal = match read_signal(path) {
        Ok(signal) => signal,
        Err(err) => {
            warn!(path = %path.display(), %err, "Discarding unreadable signal file");
            remove_consumed(path);
            return None;
        }
    };

    remove_consumed(path);

    if signal.is_stale(max_age_secs) {
        warn!(
            path = %path.display(),
            age_secs = signal.age_seconds(),
            "Discarding stale signal"
        );
        return None;
    }

    Some(signal)
}

fn remove_consumed(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), %err, "Failed to delete consumed signal file");
        }
    }
}
