//! Sync Error Types
//!
//! This module defines the error type shared by the queue, the stores and the
//! coordinator.
//!
//! # Error Categories
//!
//! - `Network` - a remote call failed; recoverable, drives queue retries
//! - `Storage` - a local read or write failed; logged and treated as best-effort
//! - `Validation` - a snapshot is structurally broken; blocks acceptance
//! - `Conflict` - local and remote diverged and need an explicit choice
//!
//! # Usage
//!
//! ```rust
//! use onboarding_sync::shared::error::SyncError;
//!
//! let error = SyncError::network("connection reset");
//! assert!(error.is_recoverable());
//! ```
use thiserror::Error;

/// Errors produced by the progress sync subsystem
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Remote store call failed
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// Local store read or write failed
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// Snapshot failed structural validation
    #[error("Validation failed: {}", errors.join("; "))]
    Validation {
        /// Individual validation errors
        errors: Vec<String>,
    },

    /// Local and remote progress diverged and require a user decision
    #[error("Conflict requires resolution: {fields:?}")]
    Conflict {
        /// Dot-paths of the diverging fields
        fields: Vec<String>,
    },

    /// Explicit sync requested while connectivity is unavailable
    #[error("No network connection")]
    NoConnection,

    /// `resolve_conflict` called without a pending conflict
    #[error("No pending conflict to resolve")]
    NoPendingConflict,

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Storage { .. } | Self::NoConnection)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;
