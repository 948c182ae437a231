//! # Offline Mutation Queue
//!
//! Holds remote mutations that could not be delivered and retries them until
//! they succeed or run out of attempts.
//!
//! ## Features
//!
//! - **Persistent Queue**: the whole queue is written to the local store after
//!   every mutating operation and restored at start-up
//! - **Bounded**: at most `capacity` items; the oldest are evicted first
//! - **Single-flight Drains**: a drain requested while another is running
//!   returns immediately without touching the queue or the remote store
//! - **Backoff**: failed items wait `base * 2^(retry_count - 1)` before the
//!   next automatic attempt and are dropped after `max_retries` failures
//! - **Connectivity Aware**: enqueueing while online and regaining
//!   connectivity both trigger a drain
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use onboarding_sync::offline::queue::{OfflineQueue, QueueConfig, QueueOperation};
//! # use onboarding_sync::shared::clock::{SystemClock, UuidGenerator};
//! # use onboarding_sync::storage::{MemoryLocalStore, MemoryRemoteStore};
//! # use onboarding_sync::sync::network_monitor::ConnectivityMonitor;
//! # use std::sync::Arc;
//! # async fn run() {
//! let clock = Arc::new(SystemClock);
//! let queue = OfflineQueue::new(
//!     Arc::new(MemoryLocalStore::new()),
//!     Arc::new(MemoryRemoteStore::new(clock.clone(), "user-1")),
//!     ConnectivityMonitor::online(),
//!     clock,
//!     Arc::new(UuidGenerator),
//!     QueueConfig::default(),
//! );
//!
//! queue.enqueue(QueueOperation::ClearProgress).await;
//! let status = queue.drain().await;
//! println!("{} item(s) still pending", status.item_count);
//! # }
//! ```

use crate::offline::metrics::{QueueMetrics, QueueMetricsSnapshot};
use crate::offline::retry::BackoffStrategy;
use crate::shared::clock::{Clock, IdGenerator};
use crate::shared::error::{Result, SyncError};
use crate::shared::progress::ProgressSnapshot;
use crate::storage::{LocalStore, RemoteStore, QUEUE_KEY};
use crate::sync::network_monitor::{ConnectivityMonitor, NetworkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Default queue bound
pub const DEFAULT_CAPACITY: usize = 50;

/// Default retry budget per item
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of queued items
    pub capacity: usize,
    /// Retry budget given to items enqueued without an explicit one
    pub default_max_retries: u32,
    /// Delay between automatic retries
    pub backoff: BackoffStrategy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_max_retries: DEFAULT_MAX_RETRIES,
            backoff: BackoffStrategy::default(),
        }
    }
}

/// Remote mutation waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOperation {
    /// Merge-write the snapshot into the remote document
    SaveProgress(ProgressSnapshot),
    /// Tombstone the remote document
    ClearProgress,
}

impl QueueOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::SaveProgress(_) => OperationKind::SaveProgress,
            Self::ClearProgress => OperationKind::ClearProgress,
        }
    }
}

/// Operation discriminant as persisted in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    SaveProgress,
    ClearProgress,
}

/// Queued operation with retry bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Unique id assigned at enqueue time
    pub id: String,
    pub operation: QueueOperation,
    /// Enqueue time
    pub timestamp: DateTime<Utc>,
    /// Failed delivery attempts so far
    pub retry_count: u32,
    /// Failed attempts after which the item is dropped
    pub max_retries: u32,
}

/// Queue size and drain state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub item_count: usize,
    pub is_processing: bool,
}

/// Persisted queue blob
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedQueue {
    items: Vec<PersistedItem>,
    #[serde(default)]
    is_processing: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedItem {
    id: String,
    #[serde(rename = "type")]
    kind: OperationKind,
    #[serde(default)]
    data: Option<ProgressSnapshot>,
    timestamp: DateTime<Utc>,
    retry_count: u32,
    max_retries: u32,
}

impl From<&QueueItem> for PersistedItem {
    fn from(item: &QueueItem) -> Self {
        let data = match &item.operation {
            QueueOperation::SaveProgress(snapshot) => Some(snapshot.clone()),
            QueueOperation::ClearProgress => None,
        };
        Self {
            id: item.id.clone(),
            kind: item.operation.kind(),
            data,
            timestamp: item.timestamp,
            retry_count: item.retry_count,
            max_retries: item.max_retries,
        }
    }
}

impl TryFrom<PersistedItem> for QueueItem {
    type Error = SyncError;

    fn try_from(item: PersistedItem) -> Result<Self> {
        let operation = match (item.kind, item.data) {
            (OperationKind::SaveProgress, Some(snapshot)) => QueueOperation::SaveProgress(snapshot),
            (OperationKind::SaveProgress, None) => {
                return Err(SyncError::serialization(format!(
                    "queued save {} has no snapshot",
                    item.id
                )))
            }
            (OperationKind::ClearProgress, _) => QueueOperation::ClearProgress,
        };
        Ok(Self {
            id: item.id,
            operation,
            timestamp: item.timestamp,
            retry_count: item.retry_count,
            max_retries: item.max_retries,
        })
    }
}

/// Releases the single-flight flag on every exit path of a drain
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Durable, bounded FIFO of pending remote mutations
#[derive(Debug)]
pub struct OfflineQueue {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: ConnectivityMonitor,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: QueueConfig,
    /// Queued items, oldest first
    items: RwLock<VecDeque<QueueItem>>,
    /// Single-flight flag
    is_processing: AtomicBool,
    metrics: QueueMetrics,
}

impl OfflineQueue {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: QueueConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            local,
            remote,
            connectivity,
            clock,
            ids,
            config,
            items: RwLock::new(VecDeque::new()),
            is_processing: AtomicBool::new(false),
            metrics: QueueMetrics::new(),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Queue an operation with the default retry budget
    pub async fn enqueue(self: &Arc<Self>, operation: QueueOperation) -> String {
        self.enqueue_with_retries(operation, self.config.default_max_retries)
            .await
    }

    /// Queue an operation, evicting the oldest items when full.
    ///
    /// The queue is persisted before returning. When connectivity is
    /// available a drain is started in the background.
    pub async fn enqueue_with_retries(
        self: &Arc<Self>,
        operation: QueueOperation,
        max_retries: u32,
    ) -> String {
        let item = QueueItem {
            id: self.ids.next_id(),
            operation,
            timestamp: self.clock.now(),
            retry_count: 0,
            max_retries,
        };
        let id = item.id.clone();

        {
            let mut items = self.items.write().await;
            let mut evicted = 0u64;
            while items.len() >= self.config.capacity.max(1) {
                if let Some(oldest) = items.pop_front() {
                    tracing::warn!(id = %oldest.id, kind = ?oldest.operation.kind(), "Offline queue full, evicting oldest item");
                    evicted += 1;
                }
            }
            if evicted > 0 {
                self.metrics.record_evicted(evicted);
            }
            tracing::debug!(%id, kind = ?item.operation.kind(), max_retries, "Queued remote mutation");
            items.push_back(item);
        }

        self.persist().await;

        if self.connectivity.is_online() {
            self.spawn_drain();
        }
        id
    }

    /// Alias of [`enqueue_with_retries`](Self::enqueue_with_retries)
    pub async fn add_to_queue(
        self: &Arc<Self>,
        operation: QueueOperation,
        max_retries: Option<u32>,
    ) -> String {
        let max_retries = max_retries.unwrap_or(self.config.default_max_retries);
        self.enqueue_with_retries(operation, max_retries).await
    }

    /// Run one delivery pass over the items queued when the pass starts.
    ///
    /// Returns immediately if another pass is in flight. Failed items have
    /// their retry count bumped and are dropped once it reaches their budget;
    /// survivors get one backoff re-drain scheduled for the whole pass.
    pub async fn drain(self: &Arc<Self>) -> QueueStatus {
        let Some(guard) = ProcessingGuard::acquire(&self.is_processing) else {
            self.metrics.record_drain_skipped();
            tracing::debug!("Drain already in flight, skipping");
            return self.status().await;
        };
        self.metrics.record_drain_start();

        let pending: Vec<QueueItem> = self.items.read().await.iter().cloned().collect();
        if pending.is_empty() {
            drop(guard);
            return self.status().await;
        }
        tracing::info!(count = pending.len(), "Draining offline queue");
        let pass_ids: HashSet<String> = pending.iter().map(|item| item.id.clone()).collect();

        let mut next_delay: Option<Duration> = None;
        for item in pending {
            if !self.contains(&item.id).await {
                tracing::debug!(id = %item.id, "Item left the queue before delivery");
                continue;
            }
            let outcome = self.deliver(&item.operation).await;

            let mut items = self.items.write().await;
            let Some(position) = items.iter().position(|queued| queued.id == item.id) else {
                tracing::debug!(id = %item.id, "Item left the queue during delivery");
                continue;
            };

            match outcome {
                Ok(written_at) => {
                    items.remove(position);
                    self.metrics.record_synced();
                    tracing::debug!(id = %item.id, %written_at, "Delivered queued mutation");
                }
                Err(err) => {
                    let entry = &mut items[position];
                    entry.retry_count += 1;
                    if entry.retry_count >= entry.max_retries {
                        tracing::warn!(
                            id = %entry.id,
                            retries = entry.retry_count,
                            error = %err,
                            "Dropping queued mutation after exhausting retries"
                        );
                        items.remove(position);
                        self.metrics.record_dropped();
                    } else {
                        let delay = self.config.backoff.delay_for(entry.retry_count);
                        tracing::debug!(
                            id = %entry.id,
                            retry_count = entry.retry_count,
                            ?delay,
                            error = %err,
                            "Queued mutation failed, will retry"
                        );
                        next_delay = Some(next_delay.map_or(delay, |current| current.min(delay)));
                        self.metrics.record_retry();
                    }
                }
            }
        }

        self.persist().await;
        drop(guard);

        match next_delay {
            Some(delay) => self.schedule_redrain(delay),
            None => {
                let queued_during_pass = self
                    .items
                    .read()
                    .await
                    .iter()
                    .any(|item| !pass_ids.contains(&item.id));
                if queued_during_pass && self.connectivity.is_online() {
                    tracing::debug!("Items queued during the pass, draining again");
                    self.spawn_drain();
                }
            }
        }

        let status = self.status().await;
        tracing::info!(remaining = status.item_count, "Offline queue drain finished");
        status
    }

    /// Alias of [`drain`](Self::drain)
    pub async fn process_queue(self: &Arc<Self>) -> QueueStatus {
        self.drain().await
    }

    /// Drain now, failing with [`SyncError::NoConnection`] while offline
    pub async fn force_sync(self: &Arc<Self>) -> Result<QueueStatus> {
        if !self.connectivity.is_online() {
            tracing::warn!("Force sync requested while offline");
            return Err(SyncError::NoConnection);
        }
        Ok(self.drain().await)
    }

    pub async fn status(&self) -> QueueStatus {
        QueueStatus {
            item_count: self.items.read().await.len(),
            is_processing: self.is_processing.load(Ordering::Acquire),
        }
    }

    /// Copy of the queued items, oldest first
    pub async fn items(&self) -> Vec<QueueItem> {
        self.items.read().await.iter().cloned().collect()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Remove every queued item
    pub async fn clear(&self) {
        let removed = {
            let mut items = self.items.write().await;
            let removed = items.len();
            items.clear();
            removed
        };
        tracing::info!(removed, "Cleared offline queue");
        self.persist().await;
    }

    /// Remove queued saves so they cannot overwrite a later clear.
    /// Returns how many were removed.
    pub async fn discard_pending_saves(&self) -> usize {
        let removed = {
            let mut items = self.items.write().await;
            let before = items.len();
            items.retain(|item| !matches!(item.operation, QueueOperation::SaveProgress(_)));
            before - items.len()
        };
        if removed > 0 {
            tracing::debug!(removed, "Discarded queued saves");
            self.persist().await;
        }
        removed
    }

    /// Remove queued saves no newer than `snapshot`, which has already
    /// reached the remote store. Returns how many were removed.
    pub async fn discard_saves_superseded_by(&self, snapshot: &ProgressSnapshot) -> usize {
        let removed = {
            let mut items = self.items.write().await;
            let before = items.len();
            items.retain(|item| match &item.operation {
                QueueOperation::SaveProgress(queued) => queued.last_updated > snapshot.last_updated,
                QueueOperation::ClearProgress => true,
            });
            before - items.len()
        };
        if removed > 0 {
            tracing::debug!(removed, "Discarded superseded queued saves");
            self.persist().await;
        }
        removed
    }

    /// Load the persisted queue, placing restored items ahead of anything
    /// queued since start-up. An unreadable blob is logged and ignored.
    /// Returns how many items were restored.
    pub async fn restore(&self) -> usize {
        let raw = match self.local.get(QUEUE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(err) => {
                tracing::warn!(error = %err, "Could not read persisted offline queue");
                return 0;
            }
        };

        let persisted: PersistedQueue = match serde_json::from_str(&raw) {
            Ok(persisted) => persisted,
            Err(err) => {
                tracing::warn!(error = %err, "Persisted offline queue is unreadable, starting empty");
                return 0;
            }
        };

        let restored: Vec<QueueItem> = persisted
            .items
            .into_iter()
            .filter_map(|item| match QueueItem::try_from(item) {
                Ok(item) => Some(item),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping malformed queued item");
                    None
                }
            })
            .collect();
        let count = restored.len();

        {
            let mut items = self.items.write().await;
            let known: HashSet<String> = restored.iter().map(|item| item.id.clone()).collect();
            let mut merged: VecDeque<QueueItem> = restored.into();
            merged.extend(items.drain(..).filter(|item| !known.contains(&item.id)));
            while merged.len() > self.config.capacity.max(1) {
                merged.pop_front();
            }
            *items = merged;
        }

        tracing::info!(count, "Restored offline queue");
        count
    }

    /// Drain every time connectivity comes back. The task ends when the
    /// queue is dropped.
    pub fn spawn_connectivity_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.connectivity.subscribe();
        let queue = Arc::downgrade(self);

        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let status = *changes.borrow_and_update();
                if status != NetworkStatus::Online {
                    continue;
                }
                let Some(queue) = queue.upgrade() else {
                    break;
                };
                tracing::debug!("Connectivity regained, draining offline queue");
                queue.drain().await;
            }
        })
    }

    async fn contains(&self, id: &str) -> bool {
        self.items.read().await.iter().any(|item| item.id == id)
    }

    async fn deliver(&self, operation: &QueueOperation) -> Result<DateTime<Utc>> {
        match operation {
            QueueOperation::SaveProgress(snapshot) => self.remote.merge_write(snapshot).await,
            QueueOperation::ClearProgress => self.remote.write_tombstone().await,
        }
    }

    fn spawn_drain(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.drain().await;
        });
    }

    fn schedule_redrain(self: &Arc<Self>, delay: Duration) {
        tracing::debug!(?delay, "Scheduling offline queue retry");
        let queue: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(queue) = queue.upgrade() else {
                return;
            };
            if queue.connectivity.is_online() {
                queue.drain().await;
            } else {
                tracing::debug!("Still offline, skipping scheduled retry");
            }
        });
    }

    async fn persist(&self) {
        let blob = {
            let items = self.items.read().await;
            PersistedQueue {
                items: items.iter().map(PersistedItem::from).collect(),
                // a restored queue is never mid-drain
                is_processing: false,
            }
        };

        let raw = match serde_json::to_string(&blob) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize offline queue");
                return;
            }
        };

        if let Err(err) = self.local.set(QUEUE_KEY, &raw).await {
            tracing::warn!(error = %err, "Failed to persist offline queue");
        }
    }
}
