//! Property-based tests for conflict analysis

use crate::common::{snapshot, t0};
use onboarding_sync::sync::{analyze_conflict, Resolution};
use proptest::collection::btree_set;
use proptest::prelude::*;

prop_compose! {
    fn steps()(current in 0u32..=12, completed in btree_set(1u32..=12, 0..5)) -> (u32, Vec<u32>) {
        (current, completed.into_iter().collect())
    }
}

proptest! {
    #[test]
    fn test_close_writes_never_conflict(
        (local_step, local_done) in steps(),
        (remote_step, remote_done) in steps(),
        gap_secs in -300i64..=300,
    ) {
        let local = snapshot(local_step, &local_done, t0(), "phone");
        let remote = snapshot(remote_step, &remote_done, t0() + chrono::Duration::seconds(gap_secs), "tablet");

        let analysis = analyze_conflict(&local, &remote);
        prop_assert!(!analysis.has_conflict);
        prop_assert!(analysis.recommended_resolution != Resolution::UserChoice);
    }

    #[test]
    fn test_conflict_detection_is_symmetric(
        (a_step, a_done) in steps(),
        (b_step, b_done) in steps(),
        gap_mins in 0i64..120,
    ) {
        let a = snapshot(a_step, &a_done, t0(), "phone");
        let b = snapshot(b_step, &b_done, t0() + chrono::Duration::minutes(gap_mins), "tablet");

        let forward = analyze_conflict(&a, &b);
        let backward = analyze_conflict(&b, &a);

        prop_assert_eq!(forward.has_conflict, backward.has_conflict);
        prop_assert_eq!(forward.conflict_fields, backward.conflict_fields);
        prop_assert_eq!(forward.significant_difference, backward.significant_difference);
        prop_assert_eq!(forward.local_newer, backward.remote_newer);
    }

    #[test]
    fn test_identical_progress_never_conflicts(
        (step, done) in steps(),
        gap_mins in 0i64..10_000,
    ) {
        let local = snapshot(step, &done, t0(), "phone");
        let remote = snapshot(step, &done, t0() + chrono::Duration::minutes(gap_mins), "phone");

        let analysis = analyze_conflict(&local, &remote);
        prop_assert!(!analysis.has_conflict);
        prop_assert!(analysis.conflict_fields.is_empty());
    }

    #[test]
    fn test_step_change_far_apart_needs_user(
        (step, done) in steps(),
        bump in 1u32..=3,
        gap_mins in 6i64..600,
    ) {
        let local = snapshot(step, &done, t0(), "phone");
        let remote = snapshot((step + bump).min(12), &done, t0() + chrono::Duration::minutes(gap_mins), "phone");
        prop_assume!(local.current_step != remote.current_step);

        let analysis = analyze_conflict(&local, &remote);
        prop_assert!(analysis.has_conflict);
        prop_assert_eq!(analysis.recommended_resolution, Resolution::UserChoice);
    }
}
