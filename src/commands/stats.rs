//! Statistics commands

use crate::AppState;

#[tauri::command]
pub async fn get_stats_summary(state: tauri::State<'_, AppState>) -> Result<String, String> {
    Ok(state.controller.stats_summary().await)
}
