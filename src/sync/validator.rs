//! # Progress Validator
//!
//! Structural checks over a snapshot in its persisted JSON form, so that
//! documents too broken to deserialize can still be diagnosed.
//!
//! Errors make a snapshot unacceptable; warnings are reported but do not
//! block it. Validation is pure: the current time is passed in.

use crate::shared::profile::OnboardingProfile;
use crate::shared::progress::{ProgressSnapshot, MAX_STEP};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub const WARNING_STEP_BEHIND: &str = "current step behind completed steps";
pub const WARNING_STALE: &str = "progress data is stale";

/// Time thresholds applied to `lastUpdated`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Age after which a snapshot is reported stale
    pub stale_after: chrono::Duration,
    /// How far ahead of `now` a timestamp may be before it is rejected
    pub future_tolerance: chrono::Duration,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            stale_after: chrono::Duration::days(30),
            future_tolerance: chrono::Duration::hours(24),
        }
    }
}

/// Validation outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Validate a typed snapshot through its serialized form
pub fn validate_snapshot(
    snapshot: &ProgressSnapshot,
    now: DateTime<Utc>,
    policy: &ValidationPolicy,
) -> ValidationReport {
    match serde_json::to_value(snapshot) {
        Ok(value) => validate_value(&value, now, policy),
        Err(err) => ValidationReport::from_findings(
            vec![format!("snapshot could not be serialized: {}", err)],
            Vec::new(),
        ),
    }
}

/// Validate a snapshot document
pub fn validate_value(value: &Value, now: DateTime<Utc>, policy: &ValidationPolicy) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(doc) = value.as_object() else {
        errors.push("snapshot must be an object".to_string());
        return ValidationReport::from_findings(errors, warnings);
    };

    match doc.get("profile") {
        None | Some(Value::Null) => errors.push("profile is missing".to_string()),
        Some(profile @ Value::Object(_)) => {
            if let Err(err) = serde_json::from_value::<OnboardingProfile>(profile.clone()) {
                errors.push(format!("profile is malformed: {}", err));
            }
        }
        Some(_) => errors.push("profile must be an object".to_string()),
    }

    let current_step = match doc.get("currentStep") {
        None | Some(Value::Null) => {
            errors.push("currentStep is missing".to_string());
            None
        }
        Some(raw) => match raw.as_u64() {
            Some(step) if step <= u64::from(MAX_STEP) => Some(step),
            _ => {
                errors.push(format!("currentStep must be an integer between 0 and {}", MAX_STEP));
                None
            }
        },
    };

    let mut max_completed: Option<u64> = None;
    match doc.get("completedSteps") {
        None | Some(Value::Null) => errors.push("completedSteps is missing".to_string()),
        Some(Value::Array(steps)) => {
            for (index, raw) in steps.iter().enumerate() {
                match raw.as_u64() {
                    Some(step) if (1..=u64::from(MAX_STEP)).contains(&step) => {
                        max_completed = Some(max_completed.map_or(step, |max| max.max(step)));
                    }
                    _ => errors.push(format!(
                        "completedSteps[{}] must be an integer between 1 and {}",
                        index, MAX_STEP
                    )),
                }
            }
        }
        Some(_) => errors.push("completedSteps must be an array".to_string()),
    }

    match doc.get("lastUpdated") {
        None | Some(Value::Null) => errors.push("lastUpdated is missing".to_string()),
        Some(raw) => match raw.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            Some(parsed) => {
                let last_updated = parsed.with_timezone(&Utc);
                if last_updated > now + policy.future_tolerance {
                    errors.push("lastUpdated is in the future".to_string());
                } else if now - last_updated > policy.stale_after {
                    warnings.push(WARNING_STALE.to_string());
                }
            }
            None => errors.push("lastUpdated must be an ISO-8601 timestamp".to_string()),
        },
    }

    for field in ["deviceId", "version"] {
        match doc.get(field).and_then(Value::as_str) {
            Some(text) if !text.trim().is_empty() => {}
            _ => errors.push(format!("{} must be a non-empty string", field)),
        }
    }

    if let (Some(step), Some(max)) = (current_step, max_completed) {
        if step > 0 && step <= max {
            warnings.push(WARNING_STEP_BEHIND.to_string());
        }
    }

    ValidationReport::from_findings(errors, warnings)
}
