//! Configuration commands

use tauri_plugin_opener::OpenerExt;
use tracing::info;

use crate::models::{AppConfig, PersistedAppConfig};
use crate::paths;
use crate::AppState;

#[tauri::command]
pub async fn get_app_config(
    state: tauri::State<'_, AppState>,
) -> Result<PersistedAppConfig, String> {
    Ok(state.controller.config().await)
}

/// Persist a configuration change, a running session keeps its snapshot
#[tauri::command]
pub async fn update_config(
    state: tauri::State<'_, AppState>,
    config: AppConfig,
) -> Result<PersistedAppConfig, String> {
    let updated = state
        .controller
        .update_config(config)
        .await
        .map_err(|e| e.to_string())?;

    state
        .log_broadcaster
        .set_enabled(updated.logger_settings.enable_frontend_logging);
    info!(
        "frontend logging {}",
        if updated.logger_settings.enable_frontend_logging {
            "enabled"
        } else {
            "disabled"
        }
    );

    Ok(updated)
}

#[tauri::command]
pub fn get_log_dir(state: tauri::State<'_, AppState>) -> Result<String, String> {
    Ok(paths::log_dir(&state.data_dir).to_string_lossy().to_string())
}

#[tauri::command]
pub fn open_log_folder(app: tauri::AppHandle, state: tauri::State<'_, AppState>) -> Result<(), String> {
    let log_dir = paths::log_dir(&state.data_dir);
    std::fs::create_dir_all(&log_dir).map_err(|e| format!("failed to create log directory: {}", e))?;
    app.opener()
        .open_path(log_dir.to_string_lossy(), None::<&str>)
        .map_err(|e| format!("failed to open log directory: {}", e))
}
