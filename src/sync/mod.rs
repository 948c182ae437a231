//! # Progress Sync Coordinator
//!
//! Orchestrates local persistence, remote writes, conflict detection and the
//! offline queue for one user's onboarding progress.
//!
//! ## Architecture
//!
//! The coordinator ties together:
//! - **Validator**: structural checks before a snapshot is saved or accepted
//! - **Conflict Resolver**: analysis and merge of divergent copies
//! - **Network Monitor**: connectivity signal driving queue drains
//! - **Scheduler**: debounce timer coalescing rapid edits into one save
//! - **Sync State**: the draft being edited and the last sync outcomes
//!
//! ## Data flow
//!
//! Edits mutate the in-memory draft and re-arm the debounce timer. A save
//! stamps the draft into a snapshot, writes it locally, then tries the remote
//! store; a failed or impossible remote write is handed to the offline queue.
//! Loading reads both stores and either adopts one side, merges them, or
//! parks the pair as a pending conflict for the user to settle.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use onboarding_sync::shared::clock::{SystemClock, UuidGenerator};
//! # use onboarding_sync::shared::config::SyncConfig;
//! # use onboarding_sync::storage::{MemoryLocalStore, MemoryRemoteStore};
//! # use onboarding_sync::sync::{ConflictChoice, SyncCoordinator};
//! # use onboarding_sync::sync::network_monitor::ConnectivityMonitor;
//! # use std::sync::Arc;
//! # async fn run() -> onboarding_sync::Result<()> {
//! let clock = Arc::new(SystemClock);
//! let coordinator = SyncCoordinator::new(
//!     Arc::new(MemoryLocalStore::new()),
//!     Arc::new(MemoryRemoteStore::new(clock.clone(), "user-1")),
//!     ConnectivityMonitor::online(),
//!     clock,
//!     Arc::new(UuidGenerator),
//!     &SyncConfig::default(),
//! );
//! coordinator.start().await;
//!
//! if coordinator.load_progress().await.is_none() && coordinator.status().await.pending_conflict.is_some() {
//!     coordinator.resolve_conflict(ConflictChoice::Merge).await?;
//! }
//!
//! coordinator.update_profile(|profile| profile.first_name = Some("Ada".into())).await;
//! coordinator.complete_step(1).await?;
//! coordinator.flush().await?;
//! # Ok(())
//! # }
//! ```

pub mod conflict_resolver;
pub mod network_monitor;
pub mod scheduler;
pub mod sync_state;
pub mod validator;

pub use conflict_resolver::{
    analyze_conflict, merge_progress, ConflictAnalysis, ConflictChoice, ConflictPolicy,
    ConflictResolver, Resolution,
};
pub use network_monitor::{ConnectivityMonitor, NetworkStatus};
pub use sync_state::{PendingConflict, SyncStatus};
pub use validator::{validate_snapshot, validate_value, ValidationPolicy, ValidationReport};

use crate::offline::queue::{OfflineQueue, QueueOperation, QueueStatus};
use crate::shared::clock::{Clock, IdGenerator};
use crate::shared::config::SyncConfig;
use crate::shared::error::{Result, SyncError};
use crate::shared::profile::OnboardingProfile;
use crate::shared::progress::{ProgressDraft, ProgressSnapshot, MAX_STEP};
use crate::storage::{LocalStore, RemoteStore, DEVICE_ID_KEY, PROGRESS_KEY};
use chrono::{DateTime, Utc};
use scheduler::SaveDebouncer;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use sync_state::SyncState;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;

/// Which store a loaded document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Remote,
}

/// Main sync coordinator
#[derive(Debug)]
pub struct SyncCoordinator {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    queue: Arc<OfflineQueue>,
    connectivity: ConnectivityMonitor,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    resolver: ConflictResolver,
    validation: ValidationPolicy,
    debouncer: SaveDebouncer,
    state: RwLock<SyncState>,
    device_id: OnceCell<String>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCoordinator {
    /// Create a coordinator and its offline queue
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: &SyncConfig,
    ) -> Arc<Self> {
        let queue = OfflineQueue::new(
            Arc::clone(&local),
            Arc::clone(&remote),
            connectivity.clone(),
            Arc::clone(&clock),
            Arc::clone(&ids),
            config.queue,
        );

        Arc::new(Self {
            local,
            remote,
            queue,
            connectivity,
            clock,
            ids,
            resolver: ConflictResolver::new(config.conflict),
            validation: config.validation,
            debouncer: SaveDebouncer::new(config.debounce),
            state: RwLock::new(SyncState::default()),
            device_id: OnceCell::new(),
            listener: Mutex::new(None),
        })
    }

    /// Restore the persisted queue and start draining on reconnect.
    /// Returns the number of restored queue items.
    pub async fn start(self: &Arc<Self>) -> usize {
        let restored = self.queue.restore().await;

        let listener = self.queue.spawn_connectivity_listener();
        let previous = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(listener);
        if let Some(previous) = previous {
            previous.abort();
        }

        if restored > 0 && self.connectivity.is_online() {
            let queue = Arc::clone(&self.queue);
            tokio::spawn(async move {
                queue.drain().await;
            });
        }

        tracing::info!(restored, "Sync coordinator started");
        restored
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    /// This installation's id, created and persisted on first use
    pub async fn device_id(&self) -> String {
        self.device_id
            .get_or_init(|| async {
                match self.local.get(DEVICE_ID_KEY).await {
                    Ok(Some(id)) if !id.trim().is_empty() => return id,
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "Could not read device id"),
                }

                let id = self.ids.next_id();
                if let Err(err) = self.local.set(DEVICE_ID_KEY, &id).await {
                    tracing::warn!(error = %err, "Could not persist device id");
                }
                tracing::info!(device_id = %id, "Generated device id");
                id
            })
            .await
            .clone()
    }

    /// Copy of the progress being edited
    pub async fn draft(&self) -> ProgressDraft {
        self.state.read().await.draft.clone()
    }

    /// Edit the profile and schedule a save
    pub async fn update_profile<F>(self: &Arc<Self>, edit: F)
    where
        F: FnOnce(&mut OnboardingProfile),
    {
        edit(&mut self.state.write().await.draft.profile);
        self.schedule_save();
    }

    /// Move to `step` and schedule a save
    pub async fn set_current_step(self: &Arc<Self>, step: u32) -> Result<()> {
        if step > MAX_STEP {
            return Err(SyncError::validation(vec![format!(
                "step {} is outside 0..={}",
                step, MAX_STEP
            )]));
        }
        self.state.write().await.draft.current_step = step;
        self.schedule_save();
        Ok(())
    }

    /// Mark `step` completed and schedule a save
    pub async fn complete_step(self: &Arc<Self>, step: u32) -> Result<()> {
        if !(1..=MAX_STEP).contains(&step) {
            return Err(SyncError::validation(vec![format!(
                "step {} is outside 1..={}",
                step, MAX_STEP
            )]));
        }
        self.state.write().await.draft.complete_step(step);
        self.schedule_save();
        Ok(())
    }

    /// Run a pending debounced save immediately.
    /// Returns the saved snapshot, or `None` when nothing was pending.
    pub async fn flush(&self) -> Result<Option<ProgressSnapshot>> {
        if self.debouncer.cancel() {
            self.save_progress().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Save the current draft locally, then remotely.
    ///
    /// Fails with `Validation` for a broken draft and with `Conflict` while a
    /// conflict awaits [`resolve_conflict`](Self::resolve_conflict). Local
    /// write failures are logged, and remote failures are queued for retry.
    /// A successful remote write drops older queued saves.
    pub async fn save_progress(&self) -> Result<ProgressSnapshot> {
        self.debouncer.cancel();

        if let Some(pending) = &self.state.read().await.pending_conflict {
            return Err(SyncError::Conflict {
                fields: pending.analysis.conflict_fields.clone(),
            });
        }

        let draft = self.state.read().await.draft.clone();
        let now = self.clock.now();
        let snapshot = draft.into_snapshot(now, self.device_id().await);

        let report = validate_snapshot(&snapshot, now, &self.validation);
        if !report.is_valid {
            tracing::warn!(errors = ?report.errors, "Refusing to save invalid progress");
            return Err(SyncError::validation(report.errors));
        }

        self.write_local(&snapshot).await;
        self.push_remote(&snapshot).await;
        Ok(snapshot)
    }

    /// Load progress from both stores.
    ///
    /// Returns `None` when nothing usable exists or when the copies conflict
    /// and need [`resolve_conflict`](Self::resolve_conflict).
    pub async fn load_progress(&self) -> Option<ProgressSnapshot> {
        let now = self.clock.now();
        let (local_doc, remote_doc) = tokio::join!(self.read_local(), self.read_remote());

        let local = local_doc.and_then(|doc| self.accept(doc, Origin::Local, now));
        let remote = remote_doc.and_then(|doc| self.accept(doc, Origin::Remote, now));

        let outcome = match (local, remote) {
            (None, None) => {
                tracing::debug!("No stored progress");
                return None;
            }
            (Some(local), None) => local,
            (None, Some(remote)) => {
                self.write_local(&remote).await;
                remote
            }
            (Some(local), Some(remote)) => {
                let analysis = self.resolver.analyze(&local, &remote);
                let Some(outcome) =
                    self.resolver
                        .apply(analysis.recommended_resolution, &local, &remote, now)
                else {
                    tracing::info!(
                        fields = ?analysis.conflict_fields,
                        "Progress conflict needs a user decision"
                    );
                    self.state.write().await.pending_conflict = Some(PendingConflict {
                        local,
                        remote,
                        analysis,
                    });
                    return None;
                };

                tracing::info!(
                    resolution = ?analysis.recommended_resolution,
                    "Resolved progress automatically"
                );
                if outcome != local {
                    self.write_local(&outcome).await;
                }
                if !outcome.same_progress_as(&remote) {
                    self.push_remote(&outcome).await;
                }
                outcome
            }
        };

        self.adopt(&outcome).await;
        Some(outcome)
    }

    /// Settle the pending conflict and persist the outcome to both stores
    pub async fn resolve_conflict(&self, choice: ConflictChoice) -> Result<ProgressSnapshot> {
        let pending = self
            .state
            .write()
            .await
            .pending_conflict
            .take()
            .ok_or(SyncError::NoPendingConflict)?;

        let outcome = self
            .resolver
            .resolve(choice, &pending.local, &pending.remote, self.clock.now());
        tracing::info!(?choice, current_step = outcome.current_step, "Conflict resolved");

        self.write_local(&outcome).await;
        self.push_remote(&outcome).await;
        self.adopt(&outcome).await;
        Ok(outcome)
    }

    /// Forget all progress on this device and tombstone the remote copy
    pub async fn clear_progress(&self) {
        self.debouncer.cancel();
        {
            let mut state = self.state.write().await;
            state.draft = ProgressDraft::default();
            state.pending_conflict = None;
        }

        if let Err(err) = self.local.remove(PROGRESS_KEY).await {
            tracing::warn!(error = %err, "Failed to remove local progress");
        }
        self.queue.discard_pending_saves().await;

        if self.remote.identity().is_none() {
            tracing::debug!("No remote identity, cleared locally only");
            return;
        }
        if !self.connectivity.is_online() {
            self.queue.enqueue(QueueOperation::ClearProgress).await;
            return;
        }

        match self.remote.write_tombstone().await {
            Ok(written_at) => {
                self.state.write().await.last_remote_write = Some(written_at);
                tracing::info!("Cleared remote progress");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Remote clear failed, queueing");
                self.queue.enqueue(QueueOperation::ClearProgress).await;
            }
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let (pending_conflict, last_local_save, last_remote_write) = {
            let state = self.state.read().await;
            (
                state
                    .pending_conflict
                    .as_ref()
                    .map(|pending| pending.analysis.clone()),
                state.last_local_save,
                state.last_remote_write,
            )
        };

        SyncStatus {
            pending_conflict,
            save_scheduled: self.debouncer.is_pending(),
            last_local_save,
            last_remote_write,
            queue: self.queue.status().await,
            network: self.connectivity.status(),
        }
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.status().await
    }

    pub async fn force_sync_offline_queue(&self) -> Result<QueueStatus> {
        self.queue.force_sync().await
    }

    pub async fn clear_offline_queue(&self) {
        self.queue.clear().await;
    }

    fn schedule_save(self: &Arc<Self>) {
        let coordinator = Arc::downgrade(self);
        self.debouncer.schedule(async move {
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if let Err(err) = coordinator.save_progress().await {
                tracing::warn!(error = %err, "Debounced save rejected");
            }
        });
    }

    async fn adopt(&self, snapshot: &ProgressSnapshot) {
        let mut state = self.state.write().await;
        state.draft = snapshot.to_draft();
        state.pending_conflict = None;
    }

    async fn write_local(&self, snapshot: &ProgressSnapshot) {
        let raw = match snapshot.to_json() {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize progress");
                return;
            }
        };

        match self.local.set(PROGRESS_KEY, &raw).await {
            Ok(()) => {
                self.state.write().await.last_local_save = Some(self.clock.now());
                tracing::debug!(current_step = snapshot.current_step, "Saved progress locally");
            }
            Err(err) => tracing::warn!(error = %err, "Failed to save progress locally"),
        }
    }

    async fn push_remote(&self, snapshot: &ProgressSnapshot) {
        if self.remote.identity().is_none() {
            tracing::debug!("No remote identity, progress kept locally");
            return;
        }
        if !self.connectivity.is_online() {
            tracing::debug!("Offline, queueing progress for later");
            self.queue
                .enqueue(QueueOperation::SaveProgress(snapshot.clone()))
                .await;
            return;
        }

        self.queue.discard_saves_superseded_by(snapshot).await;
        if self.queue.status().await.is_processing {
            tracing::debug!("Queue drain in flight, queueing progress behind it");
            self.queue
                .enqueue(QueueOperation::SaveProgress(snapshot.clone()))
                .await;
            return;
        }

        match self.remote.merge_write(snapshot).await {
            Ok(written_at) => {
                self.state.write().await.last_remote_write = Some(written_at);
                self.queue.discard_saves_superseded_by(snapshot).await;
                tracing::debug!(%written_at, "Saved progress remotely");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Remote save failed, queueing");
                self.queue
                    .enqueue(QueueOperation::SaveProgress(snapshot.clone()))
                    .await;
            }
        }
    }

    async fn read_local(&self) -> Option<Value> {
        let raw = match self.local.get(PROGRESS_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read local progress");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(err) => {
                tracing::warn!(error = %err, "Local progress is not valid JSON");
                None
            }
        }
    }

    async fn read_remote(&self) -> Option<Value> {
        if self.remote.identity().is_none() {
            return None;
        }
        if !self.connectivity.is_online() {
            tracing::debug!("Offline, skipping remote progress read");
            return None;
        }
        match self.remote.fetch_progress().await {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to fetch remote progress");
                None
            }
        }
    }

    /// Validate and decode a stored document; invalid documents count as absent
    fn accept(&self, doc: Value, origin: Origin, now: DateTime<Utc>) -> Option<ProgressSnapshot> {
        let report = validate_value(&doc, now, &self.validation);
        if !report.is_valid {
            tracing::warn!(?origin, errors = ?report.errors, "Discarding invalid stored progress");
            return None;
        }
        if !report.warnings.is_empty() {
            tracing::info!(?origin, warnings = ?report.warnings, "Stored progress has warnings");
        }

        match serde_json::from_value(doc) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(?origin, error = %err, "Stored progress could not be decoded");
                None
            }
        }
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take() {
            listener.abort();
        }
    }
}
