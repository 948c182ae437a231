//! Onboarding Sync - Main Library
//!
//! Offline-first synchronization of onboarding progress between a device and
//! a remote per-user document store.
//!
//! # Overview
//!
//! A user's onboarding state is saved on the device first, mirrored to the
//! remote store when possible, queued for retry while offline, and reconciled
//! when two devices have diverged.
//!
//! # Module Structure
//!
//! - **`shared`** - Types used by every other module
//!   - Progress snapshot and typed profile
//!   - Error types, configuration, clock and id injection, tracing setup
//!
//! - **`storage`** - Local and remote store interfaces
//!   - In-memory, file-backed and HTTP implementations
//!
//! - **`offline`** - Durable retry queue for remote mutations
//!   - Bounded FIFO with single-flight drains and exponential backoff
//!
//! - **`sync`** - Coordination
//!   - Validation, conflict analysis and merge, debounced saves
//!
//! # Feature Flags
//!
//! - **`http`** (default) - [`storage::HttpRemoteStore`] backed by `reqwest`
//!
//! # Thread Safety
//!
//! Every component is `Send + Sync` and meant to be shared through `Arc`.
//! Shared state lives behind `tokio::sync` locks that are never held across
//! remote calls.
//!
//! # Error Handling
//!
//! Fallible operations return [`Result`], an alias over [`SyncError`].
//! Network and storage failures are absorbed where the I/O happens: they are
//! logged and, for remote writes, turned into queued retries.

/// Shared types and utilities
pub mod shared;

/// Store interfaces and implementations
pub mod storage;

/// Offline mutation queue
pub mod offline;

/// Sync coordination
pub mod sync;

pub use shared::error::{Result, SyncError};
pub use shared::progress::{ProgressDraft, ProgressSnapshot};
pub use sync::SyncCoordinator;
