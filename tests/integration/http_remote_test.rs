//! HTTP remote store against a mock document endpoint

use crate::common::{snapshot, t0, TestEnv};
use crate::{assert_err, assert_ok};
use onboarding_sync::shared::clock::SequentialIds;
use onboarding_sync::storage::{HttpRemoteStore, RemoteStore};
use onboarding_sync::sync::SyncCoordinator;
use onboarding_sync::SyncError;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOC_PATH: &str = "/v1/users/user-1/onboarding";

async fn signed_in(server: &MockServer) -> HttpRemoteStore {
    let store = assert_ok!(HttpRemoteStore::new(server.uri()));
    store.sign_in("user-1", Some("secret-token".to_string()));
    store
}

#[tokio::test]
async fn test_missing_document_reads_as_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in(&server).await;
    assert_eq!(assert_ok!(store.fetch_progress().await), None);
}

#[tokio::test]
async fn test_fetch_returns_raw_progress_with_bearer_token() {
    let server = MockServer::start().await;
    let progress = serde_json::to_value(snapshot(3, &[1, 2], t0(), "tablet")).unwrap();
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "progress": progress,
            "cleared": false,
            "updatedAt": "2026-09-01T09:00:00Z"
        })))
        .mount(&server)
        .await;

    let store = signed_in(&server).await;
    assert_eq!(assert_ok!(store.fetch_progress().await), Some(progress));
}

#[tokio::test]
async fn test_tombstoned_document_reads_as_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "progress": { "currentStep": 2 },
            "cleared": true,
            "updatedAt": "2026-09-01T09:00:00Z",
            "clearedAt": "2026-09-01T09:00:00Z"
        })))
        .mount(&server)
        .await;

    let store = signed_in(&server).await;
    assert_eq!(assert_ok!(store.fetch_progress().await), None);
}

#[tokio::test]
async fn test_merge_write_patches_progress() {
    let server = MockServer::start().await;
    let saved = snapshot(4, &[1, 2, 3], t0(), "phone");
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .and(body_partial_json(json!({
            "progress": { "currentStep": 4, "completedSteps": [1, 2, 3], "deviceId": "phone" },
            "cleared": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updatedAt": "2026-09-01T09:00:05Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in(&server).await;
    let written_at = assert_ok!(store.merge_write(&saved).await);
    assert_eq!(written_at, t0() + chrono::Duration::seconds(5));
}

#[tokio::test]
async fn test_tombstone_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .and(body_json(json!({ "progress": null, "cleared": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updatedAt": "2026-09-01T09:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in(&server).await;
    assert_eq!(assert_ok!(store.write_tombstone().await), t0());
}

#[tokio::test]
async fn test_server_error_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = signed_in(&server).await;
    assert_err!(
        store.merge_write(&snapshot(1, &[], t0(), "phone")).await,
        SyncError::Network { .. }
    );
}

#[tokio::test]
async fn test_signed_out_store_never_calls_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = assert_ok!(HttpRemoteStore::new(server.uri()));
    assert!(store.identity().is_none());
    assert_err!(store.fetch_progress().await, SyncError::Network { .. });
}

#[tokio::test]
async fn test_coordinator_saves_through_http_store() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .and(body_partial_json(json!({ "progress": { "currentStep": 2 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updatedAt": "2026-09-01T09:00:01Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let env = TestEnv::new();
    let remote = Arc::new(signed_in(&server).await);
    let coordinator = SyncCoordinator::new(
        env.local.clone(),
        remote,
        env.connectivity.clone(),
        env.clock.clone(),
        Arc::new(SequentialIds::new("device")),
        &env.config,
    );

    assert_ok!(coordinator.complete_step(1).await);
    assert_ok!(coordinator.save_progress().await);

    let status = coordinator.status().await;
    assert_eq!(status.last_remote_write, Some(t0() + chrono::Duration::seconds(1)));
    assert_eq!(status.queue.item_count, 0);
}

#[tokio::test]
async fn test_coordinator_queues_when_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let env = TestEnv::new();
    let coordinator = SyncCoordinator::new(
        env.local.clone(),
        Arc::new(signed_in(&server).await),
        env.connectivity.clone(),
        env.clock.clone(),
        Arc::new(SequentialIds::new("device")),
        &env.config,
    );

    assert_ok!(coordinator.save_progress().await);
    assert_eq!(coordinator.queue_status().await.item_count, 1);
}
