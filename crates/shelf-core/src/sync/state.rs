//! Sync state persistence
//!
//! Bookkeeping about past sync runs, kept in `sync_state.json` next to the
//! database. It is informational only: merging never depends on it, so a
//! lost or corrupt file costs nothing but the status display.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::SyncOutcome;
use super::pusher::PushReport;
use super::resolver::MergeReport;
use crate::hydrate;
use crate::storage::persistence::{atomic_write, read_if_exists};
use crate::storage::StorageResult;

/// Kind of the last successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Bootstrapped,
    Merged,
}

/// Persistent sync bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Remote's last sync time, or local completion time when it has none
    #[serde(default, with = "hydrate::option")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_outcome: Option<OutcomeKind>,
    #[serde(default)]
    pub successful_runs: u64,
    #[serde(default)]
    pub bootstraps: u64,
    #[serde(default)]
    pub last_merge: Option<MergeReport>,
    #[serde(default)]
    pub last_push: Option<PushReport>,
    /// Where to persist; in-memory only when unset
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl SyncState {
    /// Create a new sync state (in-memory only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sync state that persists to disk, loading it if present
    pub fn with_path(path: PathBuf) -> StorageResult<Self> {
        let mut state = Self::load(&path)?;
        state.path = Some(path);
        Ok(state)
    }

    /// Load state from a file; a missing file yields defaults
    pub fn load(path: &Path) -> StorageResult<Self> {
        match read_if_exists(path)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Self::default()),
        }
    }

    /// Save state to disk
    pub fn save(&self) -> StorageResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &json)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a successful run
    pub fn record(&mut self, outcome: &SyncOutcome, remote_last_sync: Option<DateTime<Utc>>) {
        self.last_sync = Some(remote_last_sync.unwrap_or_else(hydrate::now));
        self.successful_runs += 1;
        match outcome {
            SyncOutcome::Bootstrapped { push } => {
                self.last_outcome = Some(OutcomeKind::Bootstrapped);
                self.bootstraps += 1;
                self.last_merge = None;
                self.last_push = Some(*push);
            }
            SyncOutcome::Merged { merge, push } => {
                self.last_outcome = Some(OutcomeKind::Merged);
                self.last_merge = Some(*merge);
                self.last_push = Some(*push);
            }
        }
    }
}
