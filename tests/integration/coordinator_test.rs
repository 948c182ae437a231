//! Coordinator flows across two devices sharing one remote document

use crate::common::{snapshot, t0, TestEnv};
use crate::{assert_err, assert_eventually, assert_ok};
use onboarding_sync::offline::queue::QueueOperation;
use onboarding_sync::shared::progress::ProgressSnapshot;
use onboarding_sync::shared::Clock;
use onboarding_sync::storage::{LocalStore, PROGRESS_KEY};
use onboarding_sync::sync::{ConflictChoice, Resolution};
use onboarding_sync::SyncError;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn stored_locally(env: &TestEnv) -> Option<ProgressSnapshot> {
    env.local
        .peek(PROGRESS_KEY)
        .and_then(|raw| ProgressSnapshot::from_json(&raw).ok())
}

async fn seed_local(env: &TestEnv, snapshot: &ProgressSnapshot) {
    assert_ok!(env.local.set(PROGRESS_KEY, &snapshot.to_json().unwrap()).await);
}

fn seed_remote(env: &TestEnv, snapshot: &ProgressSnapshot) {
    env.remote.seed(serde_json::to_value(snapshot).unwrap());
}

#[tokio::test]
async fn test_diverged_devices_need_a_choice_and_merge_on_request() {
    let env = TestEnv::new();
    let local = snapshot(3, &[1, 2], t0(), "phone");
    let remote = snapshot(4, &[1, 2, 3], t0() + chrono::Duration::hours(1), "tablet");
    seed_local(&env, &local).await;
    seed_remote(&env, &remote);
    env.clock.set(t0() + chrono::Duration::hours(2));
    let coordinator = env.coordinator();

    assert!(coordinator.load_progress().await.is_none());

    let analysis = coordinator.status().await.pending_conflict.expect("conflict pending");
    assert!(analysis.has_conflict);
    assert!(analysis.significant_difference);
    assert_eq!(analysis.recommended_resolution, Resolution::UserChoice);

    let merged = assert_ok!(coordinator.resolve_conflict(ConflictChoice::Merge).await);

    assert_eq!(merged.current_step, 4);
    assert_eq!(merged.completed_steps, BTreeSet::from([1, 2, 3]));
    assert_eq!(merged.last_updated, env.clock.now());
    assert_eq!(stored_locally(&env), Some(merged.clone()));
    assert_eq!(env.remote.stored_snapshot(), Some(merged.clone()));
    assert_eq!(coordinator.draft().await, merged.to_draft());
    assert!(coordinator.status().await.pending_conflict.is_none());
}

#[tokio::test]
async fn test_choosing_local_overwrites_remote() {
    let env = TestEnv::new();
    let mut local = snapshot(3, &[1, 2], t0(), "phone");
    local.profile.first_name = Some("Ada".to_string());
    seed_local(&env, &local).await;
    seed_remote(&env, &snapshot(6, &[1, 2, 3, 4, 5], t0() + chrono::Duration::hours(3), "tablet"));
    env.clock.set(t0() + chrono::Duration::hours(4));
    let coordinator = env.coordinator();

    assert!(coordinator.load_progress().await.is_none());
    let chosen = assert_ok!(coordinator.resolve_conflict(ConflictChoice::Local).await);

    assert_eq!(chosen.current_step, 3);
    assert_eq!(chosen.profile.first_name.as_deref(), Some("Ada"));
    assert_eq!(env.remote.stored_snapshot(), Some(chosen));
    assert_err!(
        coordinator.resolve_conflict(ConflictChoice::Local).await,
        SyncError::NoPendingConflict
    );
}

#[tokio::test]
async fn test_small_divergence_merges_automatically_into_both_stores() {
    let env = TestEnv::new();
    let mut local = snapshot(3, &[1, 2], t0(), "phone");
    local.profile.first_name = Some("Ada".to_string());
    let mut remote = snapshot(3, &[1, 2], t0() + chrono::Duration::minutes(12), "phone");
    remote.profile.school.name = Some("Hillside".to_string());
    seed_local(&env, &local).await;
    seed_remote(&env, &remote);
    env.clock.set(t0() + chrono::Duration::minutes(20));

    let loaded = env.coordinator().load_progress().await.expect("merged progress");

    assert_eq!(loaded.profile.first_name.as_deref(), Some("Ada"));
    assert_eq!(loaded.profile.school.name.as_deref(), Some("Hillside"));
    assert_eq!(loaded.last_updated, env.clock.now());
    assert_eq!(stored_locally(&env), Some(loaded.clone()));
    assert_eq!(env.remote.stored_snapshot(), Some(loaded));
}

#[tokio::test]
async fn test_newer_remote_without_conflict_replaces_local_copy() {
    let env = TestEnv::new();
    let local = snapshot(2, &[1], t0(), "phone");
    let mut remote = local.clone();
    remote.last_updated = t0() + chrono::Duration::minutes(2);
    remote.profile.last_name = Some("Lovelace".to_string());
    seed_local(&env, &local).await;
    seed_remote(&env, &remote);

    let loaded = env.coordinator().load_progress().await;

    assert_eq!(loaded, Some(remote.clone()));
    assert_eq!(stored_locally(&env), Some(remote));
    assert_eq!(env.remote.write_count(), 0);
}

#[tokio::test]
async fn test_progress_saved_on_one_device_loads_on_another() {
    let phone = TestEnv::new();
    let coordinator = phone.coordinator();
    coordinator
        .update_profile(|p| {
            p.first_name = Some("Ada".into());
            p.interests = vec!["robotics".into(), "chess".into()];
        })
        .await;
    assert_ok!(coordinator.complete_step(1).await);
    assert_ok!(coordinator.complete_step(2).await);
    let saved = assert_ok!(coordinator.save_progress().await);

    let tablet = phone.other_device();
    let loaded = tablet.coordinator().load_progress().await;

    assert_eq!(loaded, Some(saved));
}

#[tokio::test]
async fn test_offline_edits_reach_the_remote_after_reconnect() {
    let env = TestEnv::offline();
    let coordinator = env.coordinator();
    coordinator.start().await;

    assert_ok!(coordinator.complete_step(1).await);
    let saved = assert_ok!(coordinator.save_progress().await);
    assert_eq!(coordinator.queue_status().await.item_count, 1);
    assert_eq!(env.remote.write_count(), 0);

    env.connectivity.set_connected(true);

    assert_eventually!(coordinator.queue_status().await.item_count == 0);
    assert_eq!(env.remote.stored_snapshot(), Some(saved));
}

#[tokio::test]
async fn test_clear_while_offline_cannot_be_undone_by_stale_save() {
    let env = TestEnv::offline();
    let coordinator = env.coordinator();
    coordinator.start().await;

    assert_ok!(coordinator.set_current_step(4).await);
    assert_ok!(coordinator.save_progress().await);
    coordinator.clear_progress().await;

    let items = coordinator.queue().items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].operation, QueueOperation::ClearProgress);

    env.connectivity.set_connected(true);
    assert_eventually!(coordinator.queue_status().await.item_count == 0);

    assert!(env.remote.document().unwrap().cleared);
    assert!(coordinator.load_progress().await.is_none());
}

#[tokio::test]
async fn test_queue_survives_coordinator_restart() {
    let env = TestEnv::offline();
    let first = env.coordinator();
    assert_ok!(first.save_progress().await);
    drop(first);

    env.connectivity.set_connected(true);
    let second = env.coordinator();
    assert_eq!(second.start().await, 1);

    assert_eventually!(env.remote.write_count() == 1);
    assert_eventually!(second.queue_status().await.item_count == 0);
}

#[tokio::test]
async fn test_force_sync_through_coordinator() {
    let env = TestEnv::offline();
    let coordinator = env.coordinator();
    assert_ok!(coordinator.save_progress().await);

    assert_err!(coordinator.force_sync_offline_queue().await, SyncError::NoConnection);
    assert_eq!(coordinator.queue_status().await.item_count, 1);

    env.connectivity.set_connected(true);
    let status = assert_ok!(coordinator.force_sync_offline_queue().await);
    assert_eq!(status.item_count, 0);

    coordinator.clear_offline_queue().await;
    assert_eq!(coordinator.queue_status().await.item_count, 0);
}

#[tokio::test]
async fn test_corrupt_local_copy_falls_back_to_remote() {
    let env = TestEnv::new();
    assert_ok!(env.local.set(PROGRESS_KEY, r#"{"currentStep": 99}"#).await);
    let remote = snapshot(5, &[1, 2, 3, 4], t0(), "tablet");
    seed_remote(&env, &remote);

    let loaded = env.coordinator().load_progress().await;

    assert_eq!(loaded, Some(remote.clone()));
    assert_eq!(stored_locally(&env), Some(remote));
}

#[tokio::test]
async fn test_signed_out_progress_stays_local() {
    let env = TestEnv::new();
    env.remote.set_identity(None);
    let coordinator = env.coordinator();

    assert_ok!(coordinator.complete_step(1).await);
    let saved = assert_ok!(coordinator.save_progress().await);

    assert_eq!(stored_locally(&env), Some(saved.clone()));
    assert_eq!(env.remote.write_count(), 0);
    assert_eq!(coordinator.queue_status().await.item_count, 0);
    assert_eq!(env.coordinator().load_progress().await, Some(saved));
}
