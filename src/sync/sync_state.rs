//! # Sync State Management
//!
//! Mutable coordinator state and the read-only status view built from it.

use crate::offline::queue::QueueStatus;
use crate::shared::progress::{ProgressDraft, ProgressSnapshot};
use crate::sync::conflict_resolver::ConflictAnalysis;
use crate::sync::network_monitor::NetworkStatus;
use chrono::{DateTime, Utc};

/// Divergent pair waiting for a user decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConflict {
    pub local: ProgressSnapshot,
    pub remote: ProgressSnapshot,
    pub analysis: ConflictAnalysis,
}

#[derive(Debug, Default)]
pub(crate) struct SyncState {
    /// Progress being edited
    pub draft: ProgressDraft,
    pub pending_conflict: Option<PendingConflict>,
    pub last_local_save: Option<DateTime<Utc>>,
    /// Server-assigned time of the last accepted remote write
    pub last_remote_write: Option<DateTime<Utc>>,
}

/// Coordinator introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub pending_conflict: Option<ConflictAnalysis>,
    /// A debounced save is waiting to fire
    pub save_scheduled: bool,
    pub last_local_save: Option<DateTime<Utc>>,
    pub last_remote_write: Option<DateTime<Utc>>,
    pub queue: QueueStatus,
    pub network: NetworkStatus,
}
