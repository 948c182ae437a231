//! # Offline Mutation Queue
//!
//! Keeps remote writes that could not be delivered and retries them when
//! connectivity allows.
//!
//! ## Key Components
//!
//! - `queue.rs`: the persistent, bounded, single-flight queue
//! - `retry.rs`: backoff strategies
//! - `metrics.rs`: drain and delivery counters

pub mod metrics;
pub mod queue;
pub mod retry;

// Re-export main types
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::{OfflineQueue, OperationKind, QueueConfig, QueueItem, QueueOperation, QueueStatus};
pub use retry::BackoffStrategy;
