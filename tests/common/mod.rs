//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Store, clock and connectivity fixtures
//! - Snapshot builders
//! - Custom assertion macros


// Re-export commonly used utilities
pub use fixtures::*;
