//! # Conflict Resolution System
//!
//! Detects divergence between the local and remote copies of a user's
//! progress and decides how to reconcile them.
//!
//! ## Features
//!
//! - **Field-level Analysis**: dot-path diff over steps and the typed profile
//! - **Write-race Tolerance**: differences within a short window are not
//!   treated as conflicts
//! - **Automatic Resolution**: newer-wins or merge when the divergence is small
//! - **Manual Override**: significant divergences are left to the user
//!
//! ## Decision table
//!
//! | situation                                      | resolution   |
//! |------------------------------------------------|--------------|
//! | no conflict                                    | newer side   |
//! | not significant, gap under the merge window    | `Merge`      |
//! | significant                                    | `UserChoice` |
//! | local newer and not behind                     | `Local`      |
//! | remote newer and not behind                    | `Remote`     |
//! | anything else                                  | `UserChoice` |

use crate::shared::progress::ProgressSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Time windows driving conflict decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictPolicy {
    /// Differences closer together than this are treated as one write race
    pub conflict_window: chrono::Duration,
    /// Small conflicts closer together than this are merged automatically
    pub merge_window: chrono::Duration,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            conflict_window: chrono::Duration::minutes(5),
            merge_window: chrono::Duration::minutes(30),
        }
    }
}

/// How a divergence should be settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    Local,
    Remote,
    Merge,
    UserChoice,
}

/// Resolution picked by the user for a pending conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Local,
    Remote,
    Merge,
}

impl From<ConflictChoice> for Resolution {
    fn from(choice: ConflictChoice) -> Self {
        match choice {
            ConflictChoice::Local => Self::Local,
            ConflictChoice::Remote => Self::Remote,
            ConflictChoice::Merge => Self::Merge,
        }
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAnalysis {
    /// Fields differ and the writes are far enough apart to matter
    pub has_conflict: bool,
    /// Dot-paths of differing fields, steps first, then profile, then device
    pub conflict_fields: Vec<String>,
    pub local_newer: bool,
    pub remote_newer: bool,
    /// Large enough to need an explicit user decision
    pub significant_difference: bool,
    pub recommended_resolution: Resolution,
    /// Absolute distance between the two `lastUpdated` stamps
    #[serde(skip)]
    pub time_diff: chrono::Duration,
}

/// Conflict analysis and merge with a fixed policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
}

impl ConflictResolver {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    pub fn analyze(&self, local: &ProgressSnapshot, remote: &ProgressSnapshot) -> ConflictAnalysis {
        analyze_conflict_with(&self.policy, local, remote)
    }

    /// Outcome of applying `resolution` to the pair; `None` for `UserChoice`.
    ///
    /// `Local` and `Remote` return that side unchanged; `Merge` produces a
    /// new snapshot stamped with `now`.
    pub fn apply(
        &self,
        resolution: Resolution,
        local: &ProgressSnapshot,
        remote: &ProgressSnapshot,
        now: DateTime<Utc>,
    ) -> Option<ProgressSnapshot> {
        match resolution {
            Resolution::Local => Some(local.clone()),
            Resolution::Remote => Some(remote.clone()),
            Resolution::Merge => Some(merge_progress(local, remote, now)),
            Resolution::UserChoice => None,
        }
    }

    /// Outcome of a user decision. The chosen side is re-stamped with `now`
    /// since the decision is itself a new write.
    pub fn resolve(
        &self,
        choice: ConflictChoice,
        local: &ProgressSnapshot,
        remote: &ProgressSnapshot,
        now: DateTime<Utc>,
    ) -> ProgressSnapshot {
        let mut chosen = match choice {
            ConflictChoice::Local => local.clone(),
            ConflictChoice::Remote => remote.clone(),
            ConflictChoice::Merge => return merge_progress(local, remote, now),
        };
        chosen.last_updated = now;
        chosen
    }
}

/// [`analyze_conflict_with`] using the default windows
pub fn analyze_conflict(local: &ProgressSnapshot, remote: &ProgressSnapshot) -> ConflictAnalysis {
    analyze_conflict_with(&ConflictPolicy::default(), local, remote)
}

pub fn analyze_conflict_with(
    policy: &ConflictPolicy,
    local: &ProgressSnapshot,
    remote: &ProgressSnapshot,
) -> ConflictAnalysis {
    let time_diff = (local.last_updated - remote.last_updated).abs();
    let significant_time_diff = time_diff > policy.conflict_window;
    let local_newer = local.last_updated > remote.last_updated;
    let remote_newer = remote.last_updated > local.last_updated;

    let mut conflict_fields = Vec::new();
    if local.current_step != remote.current_step {
        conflict_fields.push("currentStep".to_string());
    }
    if local.completed_steps != remote.completed_steps {
        conflict_fields.push("completedSteps".to_string());
    }
    conflict_fields.extend(local.profile.diff(&remote.profile));
    if local.device_id != remote.device_id {
        conflict_fields.push("deviceId".to_string());
    }

    let has_conflict = !conflict_fields.is_empty() && significant_time_diff;
    let step_gap = local.current_step.abs_diff(remote.current_step);
    let significant_difference = conflict_fields.len() > 2
        || conflict_fields.iter().any(|field| field == "currentStep")
        || step_gap > 1;

    let recommended_resolution = if !has_conflict {
        if local_newer {
            Resolution::Local
        } else {
            Resolution::Remote
        }
    } else if !significant_difference && time_diff < policy.merge_window {
        Resolution::Merge
    } else if significant_difference {
        Resolution::UserChoice
    } else if local_newer && local.current_step >= remote.current_step {
        Resolution::Local
    } else if remote_newer && remote.current_step >= local.current_step {
        Resolution::Remote
    } else {
        Resolution::UserChoice
    };

    tracing::debug!(
        has_conflict,
        significant_difference,
        fields = conflict_fields.len(),
        time_diff_secs = time_diff.num_seconds(),
        ?recommended_resolution,
        "Analyzed progress conflict"
    );

    ConflictAnalysis {
        has_conflict,
        conflict_fields,
        local_newer,
        remote_newer,
        significant_difference,
        recommended_resolution,
        time_diff,
    }
}

/// Merge two snapshots.
///
/// The side with the higher `currentStep` is the base (ties go to `a`).
/// Completed steps are unioned, blank profile fields on the base are filled
/// from the other side, and conflicting filled fields keep the base value.
pub fn merge_progress(a: &ProgressSnapshot, b: &ProgressSnapshot, now: DateTime<Utc>) -> ProgressSnapshot {
    let (base, other) = if b.current_step > a.current_step {
        (b, a)
    } else {
        (a, b)
    };

    ProgressSnapshot {
        profile: base.profile.merged_with(&other.profile),
        current_step: base.current_step,
        completed_steps: base
            .completed_steps
            .union(&other.completed_steps)
            .copied()
            .collect(),
        last_updated: now,
        device_id: base.device_id.clone(),
        version: base.version.clone(),
    }
}
