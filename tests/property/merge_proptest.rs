//! Property-based tests for progress merging

use crate::common::t0;
use onboarding_sync::shared::profile::OnboardingProfile;
use onboarding_sync::shared::progress::{ProgressDraft, ProgressSnapshot, MAX_STEP};
use onboarding_sync::sync::merge_progress;
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

fn profile() -> impl Strategy<Value = OnboardingProfile> {
    (
        proptest::option::of("[A-Z][a-z]{1,8}"),
        proptest::option::of("[A-Z][a-z]{1,8}"),
        proptest::option::of("[A-Z][a-z]{2,10} High"),
        proptest::option::of(1u32..=12),
        vec("[a-z]{3,8}", 0..3),
    )
        .prop_map(|(first, last, school, grade, interests)| {
            let mut profile = OnboardingProfile::default();
            profile.first_name = first;
            profile.last_name = last;
            profile.school.name = school;
            profile.school.grade = grade;
            profile.interests = interests;
            profile
        })
}

prop_compose! {
    fn progress()(
        profile in profile(),
        current_step in 0..=MAX_STEP,
        completed_steps in btree_set(1..=MAX_STEP, 0..6),
        minutes in 0i64..600,
        device in "[a-z]{4}",
    ) -> ProgressSnapshot {
        ProgressDraft { profile, current_step, completed_steps }
            .into_snapshot(t0() + chrono::Duration::minutes(minutes), device)
    }
}

proptest! {
    #[test]
    fn test_merge_keeps_highest_step(a in progress(), b in progress()) {
        let merged = merge_progress(&a, &b, t0());
        prop_assert_eq!(merged.current_step, a.current_step.max(b.current_step));
    }

    #[test]
    fn test_merge_unions_completed_steps(a in progress(), b in progress()) {
        let merged = merge_progress(&a, &b, t0());
        let expected: std::collections::BTreeSet<u32> =
            a.completed_steps.union(&b.completed_steps).copied().collect();
        prop_assert_eq!(merged.completed_steps, expected);
    }

    #[test]
    fn test_merge_is_idempotent(a in progress()) {
        let merged = merge_progress(&a, &a, t0());
        prop_assert!(merged.same_progress_as(&a));
    }

    #[test]
    fn test_merge_never_loses_filled_fields(a in progress(), b in progress()) {
        let merged = merge_progress(&a, &b, t0());
        let either = |x: &Option<String>, y: &Option<String>| x.is_some() || y.is_some();

        prop_assert_eq!(
            merged.profile.first_name.is_some(),
            either(&a.profile.first_name, &b.profile.first_name)
        );
        prop_assert_eq!(
            merged.profile.school.name.is_some(),
            either(&a.profile.school.name, &b.profile.school.name)
        );
    }

    #[test]
    fn test_merge_is_stamped_with_now(a in progress(), b in progress(), offset in 0i64..10_000) {
        let now = t0() + chrono::Duration::seconds(offset);
        prop_assert_eq!(merge_progress(&a, &b, now).last_updated, now);
    }
}
