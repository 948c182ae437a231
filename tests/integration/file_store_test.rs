//! Coordinator and queue backed by files in a temporary directory

use crate::assert_ok;
use crate::common::{save_op, t0};
use onboarding_sync::offline::queue::OfflineQueue;
use onboarding_sync::shared::clock::{ManualClock, SequentialIds};
use onboarding_sync::shared::config::SyncConfig;
use onboarding_sync::storage::{FileLocalStore, LocalStore, MemoryRemoteStore, DEVICE_ID_KEY, PROGRESS_KEY};
use onboarding_sync::sync::network_monitor::ConnectivityMonitor;
use onboarding_sync::sync::SyncCoordinator;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Device {
    local: Arc<FileLocalStore>,
    remote: Arc<MemoryRemoteStore>,
    connectivity: ConnectivityMonitor,
    clock: Arc<ManualClock>,
}

impl Device {
    fn open(dir: &Path) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        Self {
            local: Arc::new(FileLocalStore::new(dir)),
            remote: Arc::new(MemoryRemoteStore::signed_out(clock.clone())),
            connectivity: ConnectivityMonitor::offline(),
            clock,
        }
    }

    fn coordinator(&self) -> Arc<SyncCoordinator> {
        SyncCoordinator::new(
            self.local.clone(),
            self.remote.clone(),
            self.connectivity.clone(),
            self.clock.clone(),
            Arc::new(SequentialIds::new("device")),
            &SyncConfig::default(),
        )
    }

    fn queue(&self) -> Arc<OfflineQueue> {
        OfflineQueue::new(
            self.local.clone(),
            self.remote.clone(),
            self.connectivity.clone(),
            self.clock.clone(),
            Arc::new(SequentialIds::new("item")),
            SyncConfig::default().queue,
        )
    }
}

#[tokio::test]
async fn test_progress_survives_process_restart() {
    let dir = TempDir::new().unwrap();

    let saved = {
        let device = Device::open(dir.path());
        let coordinator = device.coordinator();
        coordinator
            .update_profile(|p| p.school.name = Some("Hillside".into()))
            .await;
        assert_ok!(coordinator.complete_step(1).await);
        assert_ok!(coordinator.save_progress().await)
    };

    let device = Device::open(dir.path());
    let coordinator = device.coordinator();

    assert_eq!(coordinator.load_progress().await, Some(saved.clone()));
    assert_eq!(coordinator.device_id().await, saved.device_id);
    assert!(dir.path().join(format!("{}.json", PROGRESS_KEY)).exists());
}

#[tokio::test]
async fn test_device_id_file_is_reused() {
    let dir = TempDir::new().unwrap();
    let store = FileLocalStore::new(dir.path());
    assert_ok!(store.set(DEVICE_ID_KEY, "laptop-9").await);

    let device = Device::open(dir.path());
    assert_eq!(device.coordinator().device_id().await, "laptop-9");
}

#[tokio::test]
async fn test_queue_file_restores_in_order() {
    let dir = TempDir::new().unwrap();
    {
        let queue = Device::open(dir.path()).queue();
        for step in 1..=3 {
            queue.enqueue(save_op(step)).await;
        }
    }

    let queue = Device::open(dir.path()).queue();
    assert_eq!(queue.restore().await, 3);

    let ids: Vec<String> = queue.items().await.into_iter().map(|item| item.id).collect();
    assert_eq!(ids, vec!["item-1", "item-2", "item-3"]);
}

#[tokio::test]
async fn test_clear_removes_progress_file() {
    let dir = TempDir::new().unwrap();
    let device = Device::open(dir.path());
    let coordinator = device.coordinator();
    assert_ok!(coordinator.save_progress().await);

    coordinator.clear_progress().await;

    assert!(!dir.path().join(format!("{}.json", PROGRESS_KEY)).exists());
    assert!(coordinator.load_progress().await.is_none());
}
