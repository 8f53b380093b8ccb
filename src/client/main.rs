/**
 * task-watch - Command-line task status watcher
 *
 * Opens the live status channel for one task and prints every frame until
 * the task finishes. Runs the offline queue and background sync alongside,
 * so records queued by earlier sessions are delivered while it watches.
 *
 * Usage: task-watch <task-id>
 */
use procurement_offline::client::offline::{ConnectivityBanner, OfflineManager};
use procurement_offline::client::sync::network_monitor::spawn_probe_loop;
use procurement_offline::client::sync::{
    BackgroundSync, ConnectivityMonitor, HttpDelivery, HttpProbe, SyncCoordinator,
};
use procurement_offline::client::task_status::{
    ChannelHandlers, ChannelState, TaskStatusChannel, WsConnector,
};
use procurement_offline::client::{Config, LocalDatabase};
use procurement_offline::shared::config::AppConfig;
use procurement_offline::shared::frame::ProcessingStatus;
use std::sync::Arc;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let Some(task_id) = std::env::args().nth(1) else {
        eprintln!("usage: task-watch <task-id>");
        std::process::exit(2);
    };

    let mut builder = AppConfig::builder();
    if let Ok(path) = std::env::var("CLIENT_CONFIG") {
        builder = builder.toml_file(path)?;
    }
    let config = Config::with_builder(builder.env())?;
    tracing::info!(server = %config.server_url(), "configuration loaded");

    // Offline queue
    let db = LocalDatabase::open(config.database_path()).await?;
    let probe = Arc::new(HttpProbe::new(config.server_url(), PROBE_TIMEOUT));
    let monitor = ConnectivityMonitor::init(probe.as_ref()).await;
    let probe_loop = spawn_probe_loop(Arc::clone(&monitor), probe, config.app().probe_interval);
    let banner = ConnectivityBanner::attach(&monitor);

    let coordinator = SyncCoordinator::new(
        Arc::new(db.clone()),
        Arc::clone(&monitor),
        Arc::new(HttpDelivery::from_config(&config)?),
    );
    let offline = OfflineManager::new(coordinator.clone());
    let mut background = BackgroundSync::new(
        config.app().sync_tag.clone(),
        coordinator,
        config.app().pending_refresh,
    );
    background.start();

    let pending = offline.pending_count().await?;
    if pending > 0 {
        tracing::info!(pending, "records waiting to sync");
        let synced = offline.sync_now().await?;
        tracing::info!(synced, "initial sync pass finished");
    }
    if let Some(message) = banner.state().message() {
        eprintln!("{}", message);
    }

    // Task status
    let handlers = ChannelHandlers::new()
        .on_status_change(|frame| {
            let message = frame.message.as_deref().unwrap_or("");
            println!(
                "[{:>5.1}%] {:<18} {}",
                frame.progress,
                frame.status.label(),
                message
            );
            if frame.status == ProcessingStatus::Error {
                eprintln!("task {} failed", frame.task_id);
            }
        })
        .on_complete(|frame| {
            if let Some(data) = &frame.data {
                match serde_json::to_string_pretty(data) {
                    Ok(text) => println!("{}", text),
                    Err(e) => tracing::warn!("cannot print result: {}", e),
                }
            }
        })
        .on_error(|e| eprintln!("connection problem: {}", e));

    let mut channel = TaskStatusChannel::new(&config, Arc::new(WsConnector), handlers);
    channel.connect(&task_id).await;

    let mut state = channel.watch_state();
    let mut online = monitor.watch();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() || state.borrow_and_update().is_closed() {
                    break;
                }
            }
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                online.borrow_and_update();
                if let Some(message) = banner.state().message() {
                    eprintln!("{}", message);
                }
            }
        }
    }

    let final_state = channel.state();
    channel.disconnect().await;
    background.stop();
    probe_loop.abort();
    db.close().await;

    let remaining = offline.status().await.pending_records;
    if remaining > 0 {
        eprintln!("{} records still queued for the next session", remaining);
    }
    if final_state == ChannelState::Failed {
        std::process::exit(1);
    }
    Ok(())
}
