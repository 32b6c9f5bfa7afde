//! Monitoring control commands

use tracing::{error, info};

use crate::models::{MonitorStatus, StartRequest};
use crate::monitor::StopOutcome;
use crate::AppState;

#[tauri::command]
pub async fn start_monitoring(
    state: tauri::State<'_, AppState>,
    request: StartRequest,
) -> Result<MonitorStatus, String> {
    state
        .controller
        .start(request)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn stop_monitoring(state: tauri::State<'_, AppState>) -> Result<StopOutcome, String> {
    state.controller.stop().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_monitor_status(
    state: tauri::State<'_, AppState>,
) -> Result<MonitorStatus, String> {
    Ok(state.controller.status().await)
}

#[tauri::command]
pub async fn lock_task(
    state: tauri::State<'_, AppState>,
    task: String,
) -> Result<MonitorStatus, String> {
    state
        .controller
        .lock_task(&task)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn unlock_task(state: tauri::State<'_, AppState>) -> Result<MonitorStatus, String> {
    Ok(state.controller.unlock_task().await)
}

/// Answer the open reflection prompt, `None` dismisses it
#[tauri::command]
pub async fn submit_reflection(
    state: tauri::State<'_, AppState>,
    text: Option<String>,
) -> Result<bool, String> {
    Ok(state.notifier.submit_reflection(text))
}

/// Stop the workers, flush statistics and exit
#[tauri::command]
pub async fn exit_app(app: tauri::AppHandle, state: tauri::State<'_, AppState>) -> Result<(), String> {
    info!("exit requested from the webview");
    if let Err(e) = state.controller.shutdown().await {
        error!("shutdown before exit failed: {}", e);
    }
    app.exit(0);
    Ok(())
}
