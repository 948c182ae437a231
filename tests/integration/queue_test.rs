//! Offline queue behaviour against the in-memory stores

use crate::common::{save_op, TestEnv};
use crate::{assert_err, assert_eventually, assert_ok};
use futures_util::future::join_all;
use onboarding_sync::offline::queue::QueueOperation;
use onboarding_sync::storage::QUEUE_KEY;
use onboarding_sync::SyncError;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_retry_budget_of_two_is_spent_after_two_failed_drains() {
    let env = TestEnv::offline();
    env.remote.set_failing(true);
    let queue = env.queue();

    queue.enqueue_with_retries(save_op(3), 2).await;

    assert_eq!(queue.drain().await.item_count, 1);
    assert_eq!(queue.drain().await.item_count, 0);
    assert_eq!(queue.drain().await.item_count, 0);
    assert_eq!(env.remote.write_count(), 2);
}

#[tokio::test]
async fn test_fifty_two_enqueues_keep_the_newest_fifty() {
    let env = TestEnv::offline();
    let queue = env.queue();

    for step in 0..52 {
        queue.enqueue(save_op(step % 12)).await;
    }

    let status = queue.status().await;
    assert_eq!(status.item_count, 50);

    let ids: Vec<String> = queue.items().await.into_iter().map(|item| item.id).collect();
    assert!(!ids.contains(&"item-1".to_string()));
    assert!(!ids.contains(&"item-2".to_string()));
    assert_eq!(ids.first().map(String::as_str), Some("item-3"));
    assert_eq!(ids.last().map(String::as_str), Some("item-52"));
}

#[tokio::test]
async fn test_enqueue_while_online_drains_once_by_itself() {
    let env = TestEnv::new();
    let queue = env.queue();

    queue.add_to_queue(save_op(2), None).await;

    assert_eventually!(queue.status().await.item_count == 0);
    assert_eq!(queue.metrics().drains_started, 1);
    assert_eq!(env.remote.write_count(), 1);
}

#[tokio::test]
async fn test_force_sync_while_offline_is_rejected() {
    let env = TestEnv::offline();
    let queue = env.queue();
    queue.enqueue(save_op(2)).await;
    let before = queue.items().await;

    assert_err!(queue.force_sync().await, SyncError::NoConnection);

    assert_eq!(queue.items().await, before);
    assert_eq!(env.remote.write_count(), 0);
    assert_eq!(
        SyncError::NoConnection.to_string(),
        "No network connection"
    );
}

#[tokio::test]
async fn test_concurrent_drains_issue_one_write_per_item() {
    let env = TestEnv::offline();
    let queue = env.queue();
    queue.enqueue(save_op(1)).await;
    queue.enqueue(save_op(2)).await;
    env.remote.set_latency(Some(Duration::from_millis(20)));

    let statuses = join_all((0..5).map(|_| queue.drain())).await;

    assert_eq!(statuses.iter().filter(|s| s.is_processing).count(), 4);
    assert_eq!(env.remote.write_count(), 2);
    let metrics = queue.metrics();
    assert_eq!(metrics.drains_started, 1);
    assert_eq!(metrics.drains_skipped, 4);
    assert_eq!(queue.status().await.item_count, 0);
}

#[tokio::test]
async fn test_items_enqueued_during_a_drain_wait_for_the_next_pass() {
    let env = TestEnv::offline();
    let queue = env.queue();
    queue.enqueue(save_op(1)).await;
    env.remote.set_latency(Some(Duration::from_millis(30)));

    let running = tokio::spawn({
        let queue = queue.clone();
        async move { queue.drain().await }
    });
    assert_eventually!(queue.status().await.is_processing);

    queue.enqueue(save_op(2)).await;
    let after_first = assert_ok!(running.await);

    assert_eq!(after_first.item_count, 1);
    assert_eq!(env.remote.write_count(), 1);

    assert_eq!(queue.drain().await.item_count, 0);
    assert_eq!(env.remote.write_count(), 2);
}

#[tokio::test]
async fn test_regained_connectivity_drains_the_queue() {
    let env = TestEnv::offline();
    let queue = env.queue();
    let listener = queue.spawn_connectivity_listener();

    queue.enqueue(save_op(1)).await;
    queue.enqueue(QueueOperation::ClearProgress).await;
    assert_eq!(env.remote.write_count(), 0);

    env.connectivity.set_connected(true);

    assert_eventually!(queue.status().await.item_count == 0);
    assert_eq!(env.remote.write_count(), 1);
    assert_eq!(env.remote.tombstone_count(), 1);
    listener.abort();
}

#[tokio::test]
async fn test_every_mutation_is_persisted() {
    let env = TestEnv::offline();
    let queue = env.queue();

    queue.enqueue(save_op(1)).await;
    let blob: serde_json::Value = serde_json::from_str(&env.local.peek(QUEUE_KEY).unwrap()).unwrap();
    assert_eq!(blob["items"].as_array().map(Vec::len), Some(1));

    queue.drain().await;
    let blob: serde_json::Value = serde_json::from_str(&env.local.peek(QUEUE_KEY).unwrap()).unwrap();
    assert_eq!(blob["items"], serde_json::json!([]));
}

#[tokio::test]
async fn test_restart_resumes_pending_items() {
    let env = TestEnv::offline();
    let first = env.queue();
    first.enqueue(save_op(5)).await;
    drop(first);

    env.connectivity.set_connected(true);
    let second = env.queue();
    assert_eq!(second.restore().await, 1);

    let status = assert_ok!(second.force_sync().await);
    assert_eq!(status.item_count, 0);
    assert_eq!(env.remote.stored_snapshot().map(|s| s.current_step), Some(5));
}
