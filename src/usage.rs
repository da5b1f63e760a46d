//! Usage collection: the set of disk paths referenced by any VM.

use crate::error::Error;
use crate::platform::{normalize_datastore_path, Platform};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

/// Referenced disk paths captured at one instant. Immutable once taken; the
/// orphan resolver only ever consults this copy, never the live platform.
#[derive(Debug, Clone)]
pub struct UsageSnapshot {
    paths: HashSet<String>,
    taken_at: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|p| normalize_datastore_path(p.as_ref()))
                .collect(),
            taken_at: Utc::now(),
        }
    }

    /// `path` is normalized before the lookup.
    pub fn is_referenced(&self, path: &str) -> bool {
        self.paths.contains(&normalize_datastore_path(path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

/// Collect every VM disk reference across the platform.
///
/// Any failure is a `Error::Snapshot`: without the complete set, no file can
/// safely be called an orphan.
pub fn collect_usage(platform: &dyn Platform) -> Result<UsageSnapshot, Error> {
    let raw = platform
        .vm_disk_paths()
        .map_err(|e| Error::Snapshot(e.to_string()))?;

    let raw_count = raw.len();
    let snapshot = UsageSnapshot::from_paths(raw);
    debug!(
        "{} disk references collapsed to {} distinct paths",
        raw_count,
        snapshot.len()
    );
    info!("Usage snapshot holds {} referenced disks", snapshot.len());

    Ok(snapshot)
}
