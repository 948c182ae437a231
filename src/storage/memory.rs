//! In-process stores.
//!
//! Both stores keep their data behind a mutex and can be told to fail, which
//! is how the queue and coordinator tests simulate storage hiccups and
//! network outages. The remote store also counts calls so tests can assert
//! that no duplicate writes happened.

use super::{LocalStore, RemoteDocument, RemoteStore};
use crate::shared::clock::Clock;
use crate::shared::error::{Result, SyncError};
use crate::shared::progress::ProgressSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Key-value store backed by a `HashMap`
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`remove` fail
    pub fn set_failing_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Raw value under `key`, bypassing failure injection
    pub fn peek(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(SyncError::storage("local store is read-only"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// Remote document store living in memory.
///
/// Writes honour tombstones: a snapshot last updated before the document was
/// cleared is acknowledged but not applied, so a stale queued save cannot
/// bring cleared progress back.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    clock: Arc<dyn Clock>,
    identity: Mutex<Option<String>>,
    document: Mutex<Option<RemoteDocument>>,
    failing: AtomicBool,
    fail_next: AtomicU32,
    latency: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    tombstones: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Store signed in as `identity`
    pub fn new(clock: Arc<dyn Clock>, identity: impl Into<String>) -> Self {
        Self {
            clock,
            identity: Mutex::new(Some(identity.into())),
            document: Mutex::new(None),
            failing: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
            latency: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            tombstones: AtomicUsize::new(0),
        }
    }

    /// Store with nobody signed in
    pub fn signed_out(clock: Arc<dyn Clock>) -> Self {
        let store = Self::new(clock, "");
        store.set_identity(None);
        store
    }

    pub fn set_identity(&self, identity: Option<String>) {
        *lock(&self.identity) = identity;
    }

    /// Fail every call until switched off
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `n` calls, then recover
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Replace the stored document's progress with a raw value
    pub fn seed(&self, progress: serde_json::Value) {
        let now = self.clock.now();
        *lock(&self.document) = Some(RemoteDocument {
            progress: Some(progress),
            cleared: false,
            updated_at: now,
            cleared_at: None,
        });
    }

    pub fn document(&self) -> Option<RemoteDocument> {
        lock(&self.document).clone()
    }

    /// Live progress decoded as a snapshot
    pub fn stored_snapshot(&self) -> Option<ProgressSnapshot> {
        self.document()
            .and_then(|doc| doc.live_progress().cloned())
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) -> Result<()> {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if lock(&self.identity).is_none() {
            return Err(SyncError::network("not signed in"));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::network("remote store unavailable"));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(SyncError::network("remote store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn identity(&self) -> Option<String> {
        lock(&self.identity).clone()
    }

    async fn fetch_progress(&self) -> Result<Option<serde_json::Value>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;
        Ok(lock(&self.document)
            .as_ref()
            .and_then(|doc| doc.live_progress().cloned()))
    }

    async fn merge_write(&self, snapshot: &ProgressSnapshot) -> Result<DateTime<Utc>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;

        let now = self.clock.now();
        let value = serde_json::to_value(snapshot)?;
        let mut document = lock(&self.document);

        if let Some(cleared_at) = document.as_ref().and_then(|doc| doc.cleared_at) {
            if snapshot.last_updated < cleared_at {
                tracing::debug!(
                    last_updated = %snapshot.last_updated,
                    %cleared_at,
                    "Ignoring write older than tombstone"
                );
                return Ok(now);
            }
        }

        let cleared_at = document.as_ref().and_then(|doc| doc.cleared_at);
        *document = Some(RemoteDocument {
            progress: Some(value),
            cleared: false,
            updated_at: now,
            cleared_at,
        });
        Ok(now)
    }

    async fn write_tombstone(&self) -> Result<DateTime<Utc>> {
        self.tombstones.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;

        let now = self.clock.now();
        *lock(&self.document) = Some(RemoteDocument {
            progress: None,
            cleared: true,
            updated_at: now,
            cleared_at: Some(now),
        });
        Ok(now)
    }
}
