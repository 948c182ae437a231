//! Onboarding Profile
//!
//! The profile is the part of a progress snapshot the user fills in step by
//! step. Its shape is closed: every field the wizard can produce is listed
//! here, grouped into nested sections. Unknown keys in persisted or remote
//! documents are dropped on deserialization instead of being carried along.
//!
//! # Field paths
//!
//! Differences are reported as dot-paths using the serialized (camelCase)
//! names, e.g. `"firstName"` or `"school.name"`. A section that is empty on
//! one side and filled on the other is reported once at the section path
//! (`"guardian"`), otherwise the section is diffed field by field.
//!
//! # Merging
//!
//! [`ProfileField::merge_from`] fills blank fields of `self` from `other` and
//! recurses into sections. When both sides hold a non-blank value, `self`
//! keeps its own. Blank means `None`, an empty or whitespace-only string, an
//! empty list, or a section whose fields are all blank.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Field-wise comparison and merge over the closed profile shape
pub trait ProfileField {
    /// Whether the field holds no meaningful value
    fn is_blank(&self) -> bool;

    /// Push `path` (or nested paths) onto `out` for every difference
    fn diff_at(&self, other: &Self, path: &str, out: &mut Vec<String>);

    /// Fill blanks in `self` from `other`, keeping non-blank values of `self`
    fn merge_from(&mut self, other: &Self);
}

/// Leaf value stored in an optional profile field
pub trait ScalarValue: Clone + PartialEq {
    fn is_blank_value(&self) -> bool {
        false
    }
}

impl ScalarValue for String {
    fn is_blank_value(&self) -> bool {
        self.trim().is_empty()
    }
}

impl ScalarValue for NaiveDate {}
impl ScalarValue for u32 {}
impl ScalarValue for bool {}

impl<T: ScalarValue> ProfileField for Option<T> {
    fn is_blank(&self) -> bool {
        self.as_ref().map_or(true, |value| value.is_blank_value())
    }

    fn diff_at(&self, other: &Self, path: &str, out: &mut Vec<String>) {
        if self != other {
            out.push(path.to_string());
        }
    }

    fn merge_from(&mut self, other: &Self) {
        if self.is_blank() && !other.is_blank() {
            *self = other.clone();
        }
    }
}

impl ProfileField for Vec<String> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn diff_at(&self, other: &Self, path: &str, out: &mut Vec<String>) {
        if self != other {
            out.push(path.to_string());
        }
    }

    fn merge_from(&mut self, other: &Self) {
        if self.is_empty() {
            self.clone_from(other);
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Implements [`ProfileField`] for a section by walking the listed fields.
/// Each field is paired with its serialized name for path reporting.
macro_rules! profile_section {
    ($ty:ident { $($field:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Whether every field of the section is blank
            pub fn is_empty(&self) -> bool {
                ProfileField::is_blank(self)
            }

            /// Whether the section is untouched (all fields at their default)
            pub fn is_unset(&self) -> bool {
                *self == Self::default()
            }

            fn diff_fields(&self, other: &Self, prefix: &str, out: &mut Vec<String>) {
                $(
                    ProfileField::diff_at(
                        &self.$field,
                        &other.$field,
                        &join_path(prefix, $name),
                        out,
                    );
                )+
            }
        }

        impl ProfileField for $ty {
            fn is_blank(&self) -> bool {
                true $(&& ProfileField::is_blank(&self.$field))+
            }

            fn diff_at(&self, other: &Self, path: &str, out: &mut Vec<String>) {
                if self.is_blank() != other.is_blank() {
                    out.push(path.to_string());
                } else {
                    self.diff_fields(other, path, out);
                }
            }

            fn merge_from(&mut self, other: &Self) {
                $( ProfileField::merge_from(&mut self.$field, &other.$field); )+
            }
        }
    };
}

/// School the learner attends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchoolInfo {
    pub name: Option<String>,
    pub grade: Option<u32>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub graduation_year: Option<u32>,
}

profile_section!(SchoolInfo {
    name => "name",
    grade => "grade",
    district => "district",
    city => "city",
    graduation_year => "graduationYear",
});

/// Parent or guardian contact, required for under-age accounts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuardianInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub relationship: Option<String>,
    pub consent_given: Option<bool>,
}

profile_section!(GuardianInfo {
    name => "name",
    email => "email",
    phone => "phone",
    relationship => "relationship",
    consent_given => "consentGiven",
});

/// App preferences picked during onboarding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub notifications_enabled: Option<bool>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub reminder_hour: Option<u32>,
}

profile_section!(Preferences {
    notifications_enabled => "notificationsEnabled",
    language => "language",
    timezone => "timezone",
    reminder_hour => "reminderHour",
});

/// Everything the onboarding wizard collects about the user.
///
/// Fields stay `None` (or empty) until the step that asks for them has been
/// completed.
///
/// # Example
/// ```rust
/// use onboarding_sync::shared::profile::OnboardingProfile;
///
/// let mut local = OnboardingProfile::default();
/// local.first_name = Some("Ada".to_string());
///
/// let mut remote = OnboardingProfile::default();
/// remote.first_name = Some("Ada".to_string());
/// remote.school.name = Some("Hillside High".to_string());
///
/// assert_eq!(local.diff(&remote), vec!["school".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnboardingProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    pub pronouns: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "SchoolInfo::is_unset")]
    pub school: SchoolInfo,
    #[serde(skip_serializing_if = "GuardianInfo::is_unset")]
    pub guardian: GuardianInfo,
    pub interests: Vec<String>,
    pub goals: Vec<String>,
    #[serde(skip_serializing_if = "Preferences::is_unset")]
    pub preferences: Preferences,
}

profile_section!(OnboardingProfile {
    first_name => "firstName",
    last_name => "lastName",
    preferred_name => "preferredName",
    pronouns => "pronouns",
    date_of_birth => "dateOfBirth",
    email => "email",
    phone => "phone",
    avatar_url => "avatarUrl",
    school => "school",
    guardian => "guardian",
    interests => "interests",
    goals => "goals",
    preferences => "preferences",
});

impl OnboardingProfile {
    /// Dot-paths of every field that differs from `other`, in declaration order
    pub fn diff(&self, other: &Self) -> Vec<String> {
        let mut out = Vec::new();
        self.diff_fields(other, "", &mut out);
        out
    }

    /// A copy of `self` with blanks filled from `other`
    pub fn merged_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }
}
