//! Progress inspection tool
//!
//! Reads the file-backed local store and prints the device id, the stored
//! snapshot's validation report and the offline queue. The queue can be
//! cleared, or pushed to the configured remote store.

use clap::{Parser, Subcommand};
use onboarding_sync::offline::queue::OfflineQueue;
use onboarding_sync::shared::clock::{Clock, SystemClock, UuidGenerator};
use onboarding_sync::shared::config::SyncConfig;
use onboarding_sync::shared::telemetry::init_tracing;
use onboarding_sync::storage::{
    FileLocalStore, LocalStore, MemoryRemoteStore, RemoteStore, DEVICE_ID_KEY, PROGRESS_KEY,
};
use onboarding_sync::sync::network_monitor::ConnectivityMonitor;
use onboarding_sync::sync::validator::validate_value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "progress-inspect", about = "Inspect locally stored onboarding progress")]
struct Args {
    /// Local store directory (defaults to the platform data directory)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// TOML configuration file; `ONBOARDING_SYNC_*` variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Drop every queued remote mutation
    ClearQueue,

    /// Deliver the queued mutations to the configured remote store
    #[cfg(feature = "http")]
    PushQueue {
        /// User whose remote document receives the mutations
        #[arg(long)]
        user: String,

        /// Bearer token for the remote store
        #[arg(long, env = "ONBOARDING_SYNC_TOKEN")]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::from_env()?,
    };

    let dir = args
        .dir
        .or_else(FileLocalStore::default_dir)
        .ok_or("no data directory available; pass --dir")?;
    tracing::info!(dir = %dir.display(), "Inspecting local store");

    let local = Arc::new(FileLocalStore::new(dir));
    let clock = Arc::new(SystemClock);

    match local.get(DEVICE_ID_KEY).await? {
        Some(id) => println!("device id: {}", id),
        None => println!("device id: <not generated yet>"),
    }

    match local.get(PROGRESS_KEY).await? {
        Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(doc) => {
                let report = validate_value(&doc, clock.now(), &config.validation);
                println!("progress: step {}", doc["currentStep"]);
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(err) => println!("progress: unreadable ({})", err),
        },
        None => println!("progress: <none>"),
    }

    let (remote, connectivity): (Arc<dyn RemoteStore>, ConnectivityMonitor) = match &args.command {
        #[cfg(feature = "http")]
        Some(Command::PushQueue { user, token }) => {
            let store = onboarding_sync::storage::HttpRemoteStore::from_config(&config)?
                .ok_or("no remote_url configured")?;
            store.sign_in(user.clone(), token.clone());
            (Arc::new(store) as Arc<dyn RemoteStore>, ConnectivityMonitor::online())
        }
        // offline and signed out, so nothing is ever delivered
        _ => (
            Arc::new(MemoryRemoteStore::signed_out(clock.clone())) as Arc<dyn RemoteStore>,
            ConnectivityMonitor::offline(),
        ),
    };

    let queue = OfflineQueue::new(
        local.clone(),
        remote,
        connectivity,
        clock,
        Arc::new(UuidGenerator),
        config.queue,
    );
    queue.restore().await;

    match args.command {
        Some(Command::ClearQueue) => {
            queue.clear().await;
            println!("offline queue cleared");
            return Ok(());
        }
        #[cfg(feature = "http")]
        Some(Command::PushQueue { .. }) => {
            let status = queue.force_sync().await?;
            let metrics = queue.metrics();
            println!(
                "pushed {} item(s), {} still queued",
                metrics.items_synced, status.item_count
            );
        }
        None => {}
    }

    let status = queue.status().await;
    println!("offline queue: {} item(s)", status.item_count);
    for item in queue.items().await {
        println!(
            "  {} {:?} queued {} retries {}/{}",
            item.id,
            item.operation.kind(),
            item.timestamp.to_rfc3339(),
            item.retry_count,
            item.max_retries
        );
    }

    Ok(())
}
