// Distraction monitor - periodic screen capture, vision classification and focus nudges

pub mod actors;
pub mod capture;
pub mod error;
pub mod event_bus;
pub mod headless;
pub mod llm;
pub mod logger;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod paths;
pub mod settings;
pub mod stats;
pub mod utils;

#[cfg(feature = "desktop")]
pub mod app;
#[cfg(feature = "desktop")]
pub mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use actors::StatsActor;
use event_bus::EventBus;
use monitor::{
    default_capturer_factory, default_classifier_factory, MonitorController, MonitorDeps,
};
use notifier::Notifier;
use settings::SettingsManager;

#[cfg(feature = "desktop")]
pub use app::run;

/// Application state shared with the Tauri commands
#[cfg(feature = "desktop")]
#[derive(Clone)]
pub struct AppState {
    pub controller: MonitorController,
    /// Resolves reflection prompts answered in the webview
    pub notifier: Arc<notifier::TauriNotifier>,
    pub log_broadcaster: Arc<logger::LogBroadcaster>,
    pub data_dir: PathBuf,
}

/// Load configuration and statistics from `data_dir` and build the controller
///
/// Fails when the statistics file exists but cannot be decoded.
pub async fn bootstrap(
    data_dir: &Path,
    notifier: Arc<dyn Notifier>,
    events: Arc<EventBus>,
) -> Result<MonitorController> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = Arc::new(SettingsManager::new(data_dir.join(paths::CONFIG_FILE)).await?);
    let stats = StatsActor::spawn(data_dir.join(paths::STATS_FILE))?;

    let controller = MonitorController::new(MonitorDeps {
        settings,
        stats,
        notifier,
        events,
        capturer_factory: default_capturer_factory(),
        classifier_factory: default_classifier_factory(llm::http_client()?),
        data_dir: data_dir.to_path_buf(),
    });

    info!("monitor ready, data directory {}", data_dir.display());
    Ok(controller)
}
