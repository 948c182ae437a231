//! Shared Module
//!
//! Types and utilities used across the crate: the progress data model, the
//! error type, configuration, and the injected time and id sources.

/// Shared error types
pub mod error;

/// Sync configuration
pub mod config;

/// Injected clock and id generator
pub mod clock;

/// Typed onboarding profile with field-wise diff and merge
pub mod profile;

/// Progress snapshot and editable draft
pub mod progress;

/// Tracing subscriber setup
pub mod telemetry;

/// Re-export commonly used types for convenience
pub use clock::{Clock, IdGenerator, ManualClock, SequentialIds, SystemClock, UuidGenerator};
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::{Result, SyncError};
pub use profile::{GuardianInfo, OnboardingProfile, Preferences, SchoolInfo};
pub use progress::{ProgressDraft, ProgressSnapshot, MAX_STEP, SCHEMA_VERSION};
