//! # Storage Ports
//!
//! Narrow interfaces to the two stores the sync subsystem talks to:
//!
//! - [`LocalStore`]: on-device string key-value storage. Always fast, used as
//!   the durability guarantee for saves.
//! - [`RemoteStore`]: the authoritative per-user document, keyed by the signed
//!   in identity. Supports point reads, merge-writes and tombstones.
//!
//! ## Implementations
//!
//! - `memory.rs`: in-process stores for tests and local development
//! - `file.rs`: one JSON file per key under a data directory
//! - `http.rs`: REST document store client (feature `http`)

pub mod file;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;

pub use file::FileLocalStore;
#[cfg(feature = "http")]
pub use http::HttpRemoteStore;
pub use memory::{MemoryLocalStore, MemoryRemoteStore};

use crate::shared::error::Result;
use crate::shared::progress::ProgressSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local key holding the serialized progress snapshot
pub const PROGRESS_KEY: &str = "onboarding_progress";
/// Local key holding the serialized offline queue
pub const QUEUE_KEY: &str = "onboarding_offline_queue";
/// Local key holding this installation's device id
pub const DEVICE_ID_KEY: &str = "device_id";

/// On-device key-value storage
#[async_trait]
pub trait LocalStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Remote onboarding document for the signed-in user
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// Identity the document is keyed by; `None` when signed out
    fn identity(&self) -> Option<String>;

    /// Point read of the stored progress in its raw JSON form.
    ///
    /// Returns `None` when no document exists or when it has been tombstoned.
    async fn fetch_progress(&self) -> Result<Option<serde_json::Value>>;

    /// Merge the snapshot into the document, clearing any tombstone.
    /// Returns the server-assigned write time.
    async fn merge_write(&self, snapshot: &ProgressSnapshot) -> Result<DateTime<Utc>>;

    /// Mark the document cleared without deleting it.
    /// Returns the server-assigned write time.
    async fn write_tombstone(&self) -> Result<DateTime<Utc>>;
}

/// Remote document as stored and transferred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// Last merged snapshot, `None` once cleared
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
    /// Tombstone flag
    #[serde(default)]
    pub cleared: bool,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
    /// Server time of the last tombstone write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
}

impl RemoteDocument {
    /// Live progress, hiding tombstoned documents
    pub fn live_progress(&self) -> Option<&serde_json::Value> {
        if self.cleared {
            None
        } else {
            self.progress.as_ref()
        }
    }
}
