//! Module fingerprints
//!
//! A fingerprint is the last-seen on-disk identity of a module's watched
//! paths: config mtime plus content digest, source-file stamps, and the
//! rebind-marker stamp. Each scan diffs a fresh snapshot against the stored
//! baseline and then replaces it, so the same change is never reported
//! twice.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::models::change::ChangeType;

/// Watched paths for one module, per the module-registry contract.
#[derive(Debug, Clone, Default)]
pub struct WatchSpec {
    /// The module's configuration file; changes here are hot-swappable.
    pub config_path: Option<PathBuf>,
    /// Source files whose change forces a restart. Entries may be literal
    /// paths or glob patterns.
    pub source_paths: Vec<PathBuf>,
    /// Marker resource whose touch means the module's service definition
    /// should be rebound in the container.
    pub rebind_marker_path: Option<PathBuf>,
}

impl WatchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.source_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rebind_marker<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.rebind_marker_path = Some(path.into());
        self
    }
}

/// Identity of a single watched file at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileStamp {
    /// Path does not exist.
    Missing,
    /// Path exists. The digest is tracked only for config files, where a
    /// content change matters even if the mtime is untouched.
    Present {
        mtime_nanos: u128,
        len: u64,
        digest: Option<String>,
    },
    /// Stat or read failed for a reason other than absence.
    Unreadable,
}

/// Snapshot of every watched path of one module.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Fingerprint {
    pub config: Option<FileStamp>,
    pub sources: BTreeMap<PathBuf, FileStamp>,
    pub rebind_marker: Option<FileStamp>,
    /// A watched pattern failed to expand; the scan is incomplete.
    pub scan_error: bool,
}

pub(crate) fn stamp(path: &Path, hash_content: bool) -> FileStamp {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return FileStamp::Missing,
        Err(err) => {
            warn!(path = %path.display(), %err, "Failed to stat watched path");
            return FileStamp::Unreadable;
        }
    };

    let mtime_nanos = match meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
    {
        Some(duration) => duration.as_nanos(),
        None => {
            warn!(path = %path.display(), "Watched path has no readable mtime");
            return FileStamp::Unreadable;
        }
    };

    let digest = if hash_content {
        match fs::read(path) {
            Ok(bytes) => Some(hex::encode(Sha256::digest(&bytes))),
            Err(err) => {
                warn!(path = %path.display(), %err, "Failed to hash watched file");
                return FileStamp::Unreadable;
            }
        }
    } else {
        None
    };

    FileStamp::Present {
        mtime_nanos,
        len: meta.len(),
        digest,
    }
}

/// Snapshot the current on-disk state of a watch spec.
pub(crate) fn snapshot(spec: &WatchSpec) -> Fingerprint {
    let mut fingerprint = Fingerprint {
        config: spec.config_path.as_ref().map(|p| stamp(p, true)),
        rebind_marker: spec.rebind_marker_path.as_ref().map(|p| stamp(p, false)),
        ..Fingerprint::default()
    };

    for entry in &spec.source_paths {
        if is_glob(entry) {
            expand_glob(entry, &mut fingerprint);
        } else {
            fingerprint.sources.insert(entry.clone(), stamp(entry, false));
        }
    }

    fingerprint
}

fn is_glob(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|s| s.contains(['*', '?', '[']))
}

fn expand_glob(pattern: &Path, fingerprint: &mut Fingerprint) {
    let Some(pattern_str) = pattern.to_str() else {
        warn!(pattern = %pattern.display(), "Watched pattern is not valid UTF-8");
        fingerprint.scan_error = true;
        return;
    };

    let paths = match glob::glob(pattern_str) {
        Ok(paths) => paths,
        Err(err) => {
            warn!(pattern = pattern_str, %err, "Invalid watched pattern");
            fingerprint.scan_error = true;
            return;
        }
    };

    for path in paths {
        match path {
            Ok(path) => {
                let file_stamp = stamp(&path, false);
                fingerprint.sources.insert(path, file_stamp);
            }
            Err(err) => {
                warn!(pattern = pattern_str, %err, "Failed to expand watched pattern");
                fingerprint.scan_error = true;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StampDelta {
    Unchanged,
    Changed,
    Vanished,
    Errored,
}

fn delta(baseline: &FileStamp, current: &FileStamp) -> StampDelta {
    match (baseline, current) {
        (FileStamp::Unreadable, _) | (_, FileStamp::Unreadable) => StampDelta::Errored,
        (FileStamp::Missing, FileStamp::Missing) => StampDelta::Unchanged,
        (FileStamp::Present { .. }, FileStamp::Missing) => StampDelta::Vanished,
        (FileStamp::Missing, FileStamp::Present { .. }) => StampDelta::Changed,
        (old @ FileStamp::Present { .. }, new @ FileStamp::Present { .. }) => {
            if old == new {
                StampDelta::Unchanged
            } else {
                StampDelta::Changed
            }
        }
    }
}

fn option_delta(baseline: Option<&FileStamp>, current: Option<&FileStamp>) -> StampDelta {
    match (baseline, current) {
        (None, None) => StampDelta::Unchanged,
        (Some(old), Some(new)) => delta(old, new),
        (Some(old), None) => delta(old, &FileStamp::Missing),
        (None, Some(new)) => delta(&FileStamp::Missing, new),
    }
}

/// Classify the drift between two snapshots of the same watch spec.
///
/// A vanished watched path or any stat failure escalates to `Source`
/// severity: detection must fail toward restart, never silently toward "no
/// change".
pub(crate) fn diff(baseline: &Fingerprint, current: &Fingerprint) -> ChangeType {
    let mut change = ChangeType::None;

    if current.scan_error {
        change = change.combine(ChangeType::Source);
    }

    change = change.combine(
        match option_delta(baseline.config.as_ref(), current.config.as_ref()) {
            StampDelta::Unchanged => ChangeType::None,
            StampDelta::Changed => ChangeType::Config,
            StampDelta::Vanished | StampDelta::Errored => ChangeType::Source,
        },
    );

    change = change.combine(
        match option_delta(
            baseline.rebind_marker.as_ref(),
            current.rebind_marker.as_ref(),
        ) {
            StampDelta::Unchanged => ChangeType::None,
            StampDelta::Changed => ChangeType::Rebindable,
            StampDelta::Vanished | StampDelta::Errored => ChangeType::Source,
        },
    );

    let paths: BTreeSet<&PathBuf> = baseline
        .sources
        .keys()
        .chain(current.sources.keys())
        .collect();
    for path in paths {
        let source_delta =
            option_delta(baseline.sources.get(path), current.sources.get(path));
        if source_delta != StampDelta::Unchanged {
            change = change.combine(ChangeType::Source);
            break;
        }
    }

    change
}
