//! Progress Snapshot
//!
//! [`ProgressSnapshot`] is the unit that is persisted locally, written to the
//! remote store and compared across devices. [`ProgressDraft`] is the mutable
//! in-memory state the wizard edits; stamping a draft with a time and a device
//! id produces a snapshot.

use crate::shared::error::{Result, SyncError};
use crate::shared::profile::OnboardingProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Highest step index; step 12 is the terminal "complete" marker
pub const MAX_STEP: u32 = 12;

/// Schema version written into new snapshots
pub const SCHEMA_VERSION: &str = "1.0";

/// A timestamped capture of onboarding progress for one user on one device.
///
/// Serialized with camelCase keys and `lastUpdated` as an RFC 3339 string:
///
/// ```json
/// {
///   "profile": { "firstName": "Ada" },
///   "currentStep": 3,
///   "completedSteps": [1, 2],
///   "lastUpdated": "2026-03-01T10:00:00Z",
///   "deviceId": "6f1c...",
///   "version": "1.0"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Fields collected so far
    pub profile: OnboardingProfile,
    /// Step the user is on, `0..=MAX_STEP`
    pub current_step: u32,
    /// Steps finished, each in `1..=MAX_STEP`
    pub completed_steps: BTreeSet<u32>,
    /// Time of the last local mutation
    pub last_updated: DateTime<Utc>,
    /// Installation that produced the snapshot
    pub device_id: String,
    /// Schema version
    pub version: String,
}

impl ProgressSnapshot {
    /// Highest completed step, if any
    pub fn max_completed_step(&self) -> Option<u32> {
        self.completed_steps.iter().next_back().copied()
    }

    /// Whether two snapshots carry the same progress, ignoring when and where
    /// they were written
    pub fn same_progress_as(&self, other: &Self) -> bool {
        self.current_step == other.current_step
            && self.completed_steps == other.completed_steps
            && self.profile == other.profile
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(SyncError::from)
    }

    /// Editable copy of the progress fields
    pub fn to_draft(&self) -> ProgressDraft {
        ProgressDraft {
            profile: self.profile.clone(),
            current_step: self.current_step,
            completed_steps: self.completed_steps.clone(),
        }
    }
}

/// In-memory onboarding state edited by the wizard between saves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressDraft {
    pub profile: OnboardingProfile,
    pub current_step: u32,
    pub completed_steps: BTreeSet<u32>,
}

impl ProgressDraft {
    /// Mark `step` finished and move past it if the user was on it
    pub fn complete_step(&mut self, step: u32) {
        self.completed_steps.insert(step);
        if self.current_step <= step {
            self.current_step = (step + 1).min(MAX_STEP);
        }
    }

    /// Whether nothing has been entered yet
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn into_snapshot(self, now: DateTime<Utc>, device_id: impl Into<String>) -> ProgressSnapshot {
        ProgressSnapshot {
            profile: self.profile,
            current_step: self.current_step,
            completed_steps: self.completed_steps,
            last_updated: now,
            device_id: device_id.into(),
            version: SCHEMA_VERSION.to_string(),
        }
    }
}
